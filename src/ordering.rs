//! Logical ordering of a todo's embedded subtasks.
//!
//! Each subtask may point at its successor through `next`, and the parent
//! keeps the id of the first subtask in `subtask_head`. The chain is the
//! display order; the position of a subtask inside `Todo::subtasks` carries
//! no meaning except as the fallback used by [`repair`].
//!
//! Mutations only touch the in-memory `Todo`. Persisting it is the caller's job.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Subtask, Todo};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderingError {
    #[error("Subtask {0} already exists in this todo")]
    DuplicateId(String),
}

/// Iterator over subtasks in logical order.
///
/// Stops at the tail, at a `next` that names no subtask, or once it has
/// yielded as many items as the todo physically holds, so a corrupted
/// chain cannot make it loop forever.
pub struct OrderedSubtasks<'a> {
    todo: &'a Todo,
    index: HashMap<&'a str, usize>,
    current: Option<&'a str>,
    remaining: usize,
}

impl<'a> Iterator for OrderedSubtasks<'a> {
    type Item = &'a Subtask;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let todo = self.todo;
        let id = self.current.take()?;
        let subtask = &todo.subtasks[*self.index.get(id)?];
        self.remaining -= 1;
        self.current = subtask.next.as_deref();
        Some(subtask)
    }
}

pub fn ordered(todo: &Todo) -> OrderedSubtasks<'_> {
    let index = todo
        .subtasks
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();
    OrderedSubtasks {
        todo,
        index,
        current: todo.subtask_head.as_deref(),
        remaining: todo.subtasks.len(),
    }
}

pub fn ordered_ids(todo: &Todo) -> Vec<String> {
    ordered(todo).map(|s| s.id.clone()).collect()
}

pub fn linked_len(todo: &Todo) -> usize {
    ordered(todo).count()
}

fn ensure_unique(todo: &Todo, id: &str) -> Result<(), OrderingError> {
    if todo.subtask(id).is_some() {
        return Err(OrderingError::DuplicateId(id.to_string()));
    }
    Ok(())
}

fn set_next(todo: &mut Todo, id: &str, next: Option<String>) {
    if let Some(subtask) = todo.subtask_mut(id) {
        subtask.next = next;
    }
}

pub fn append_to_end(todo: &mut Todo, mut subtask: Subtask) -> Result<(), OrderingError> {
    ensure_unique(todo, &subtask.id)?;
    subtask.next = None;

    let tail = ordered(todo).last().map(|s| s.id.clone());
    match tail {
        Some(tail) => set_next(todo, &tail, Some(subtask.id.clone())),
        None => todo.subtask_head = Some(subtask.id.clone()),
    }
    todo.subtasks.push(subtask);
    Ok(())
}

/// Inserts `subtask` so that it becomes the `position`-th element of the
/// logical order. Positions past the end append.
pub fn insert_at_position(
    todo: &mut Todo,
    mut subtask: Subtask,
    position: usize,
) -> Result<(), OrderingError> {
    ensure_unique(todo, &subtask.id)?;

    let order = ordered_ids(todo);
    if position >= order.len() {
        return append_to_end(todo, subtask);
    }

    subtask.next = Some(order[position].clone());
    if position == 0 {
        todo.subtask_head = Some(subtask.id.clone());
    } else {
        set_next(todo, &order[position - 1], Some(subtask.id.clone()));
    }
    todo.subtasks.push(subtask);
    Ok(())
}

/// Removes a subtask from storage and from the chain. Returns `None` and
/// leaves the todo untouched when the id is unknown.
pub fn remove(todo: &mut Todo, subtask_id: &str) -> Option<Subtask> {
    let idx = todo.subtasks.iter().position(|s| s.id == subtask_id)?;
    let removed = todo.subtasks.remove(idx);

    if let Some(pred) = todo
        .subtasks
        .iter_mut()
        .find(|s| s.next.as_deref() == Some(subtask_id))
    {
        pred.next = removed.next.clone();
    }
    if todo.subtask_head.as_deref() == Some(subtask_id) {
        todo.subtask_head = removed.next.clone();
    }
    Some(removed)
}

/// Moves a subtask to `new_position` (clamped to the last index). Returns
/// `false` without touching the todo when the id is unknown.
///
/// A subtask that is stored but cannot be placed through the chain (it is
/// unreachable from the head, or its id is shared) triggers one [`repair`]
/// before the move.
pub fn move_to_position(todo: &mut Todo, subtask_id: &str, new_position: usize) -> bool {
    if todo.subtask(subtask_id).is_none() {
        return false;
    }

    let mut order = ordered_ids(todo);
    if has_duplicate_ids(todo) || !order.iter().any(|id| id == subtask_id) {
        repair(todo);
        order = ordered_ids(todo);
    }
    let Some(current) = order.iter().position(|id| id == subtask_id) else {
        return false;
    };

    let target = new_position.min(order.len() - 1);
    if target == current {
        return true;
    }

    match remove(todo, subtask_id) {
        Some(subtask) => insert_at_position(todo, subtask, target).is_ok(),
        None => false,
    }
}

fn has_duplicate_ids(todo: &Todo) -> bool {
    let mut seen = HashSet::with_capacity(todo.subtasks.len());
    !todo.subtasks.iter().all(|s| seen.insert(s.id.as_str()))
}

/// True iff the chain from the head visits every stored subtask exactly once.
pub fn validate(todo: &Todo) -> bool {
    let index: HashMap<&str, usize> = todo
        .subtasks
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();
    if index.len() != todo.subtasks.len() {
        return false;
    }

    let mut visited = HashSet::with_capacity(todo.subtasks.len());
    let mut current = todo.subtask_head.as_deref();
    while let Some(id) = current {
        let Some(&i) = index.get(id) else {
            return false;
        };
        if !visited.insert(id) {
            return false;
        }
        current = todo.subtasks[i].next.as_deref();
    }
    visited.len() == todo.subtasks.len()
}

/// Rebuilds the chain from physical storage order. Always yields array order.
///
/// A subtask whose id repeats an earlier one is given a fresh id so that
/// every stored subtask ends up on the chain exactly once.
pub fn repair(todo: &mut Todo) {
    let mut seen = HashSet::with_capacity(todo.subtasks.len());
    for subtask in todo.subtasks.iter_mut() {
        while !seen.insert(subtask.id.clone()) {
            subtask.id = Uuid::new_v4().to_string();
        }
    }

    let ids: Vec<String> = todo.subtasks.iter().map(|s| s.id.clone()).collect();
    for (i, subtask) in todo.subtasks.iter_mut().enumerate() {
        subtask.next = ids.get(i + 1).cloned();
    }
    todo.subtask_head = ids.first().cloned();
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedListStats {
    pub array_length: usize,
    pub linked_list_length: usize,
    pub is_valid: bool,
    pub has_orphaned_subtasks: bool,
    pub ordered_subtasks: Vec<Subtask>,
}

pub fn stats(todo: &Todo) -> LinkedListStats {
    let ordered_subtasks: Vec<Subtask> = ordered(todo).cloned().collect();
    let array_length = todo.subtasks.len();
    let linked_list_length = ordered_subtasks.len();
    LinkedListStats {
        array_length,
        linked_list_length,
        is_valid: validate(todo),
        has_orphaned_subtasks: array_length != linked_list_length,
        ordered_subtasks,
    }
}
