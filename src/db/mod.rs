//! Document-store collaborator.
//!
//! A todo is stored as one document with its subtasks embedded, so every
//! update below touches exactly one document and is applied atomically by
//! the store implementation.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;
use crate::models::{Subtask, SubtaskPatch, Todo, TodoPatch, TodoStatus};
use crate::ordering;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoFilter {
    All,
    Id(String),
    Status(TodoStatus),
}

impl TodoFilter {
    pub fn id(id: impl Into<String>) -> Self {
        TodoFilter::Id(id.into())
    }

    pub fn matches(&self, todo: &Todo) -> bool {
        match self {
            TodoFilter::All => true,
            TodoFilter::Id(id) => &todo.id == id,
            TodoFilter::Status(status) => todo.status == *status,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TodoUpdate {
    Set(TodoPatch),
    /// Appends when `position` is `None`.
    InsertSubtask { subtask: Subtask, position: Option<usize> },
    MoveSubtask { subtask_id: String, position: usize },
    PullSubtask(String),
    SetSubtask { subtask_id: String, patch: SubtaskPatch },
    RepairOrder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError>;
    async fn find_one(&self, filter: &TodoFilter) -> Result<Option<Todo>, StoreError>;
    async fn insert(&self, todo: Todo) -> Result<Todo, StoreError>;
    /// Applies `update` to the first matching document as one atomic step.
    /// Returns the document as it is afterwards, and whether the update
    /// changed it.
    async fn modify_one(
        &self,
        filter: &TodoFilter,
        update: &TodoUpdate,
    ) -> Result<Option<(Todo, bool)>, StoreError>;
    /// Returns the number of documents removed (0 or 1).
    async fn delete_one(&self, filter: &TodoFilter) -> Result<u64, StoreError>;

    /// Returns the document as it is after the update.
    async fn find_one_and_update(
        &self,
        filter: &TodoFilter,
        update: &TodoUpdate,
    ) -> Result<Option<Todo>, StoreError> {
        Ok(self.modify_one(filter, update).await?.map(|(todo, _)| todo))
    }

    async fn update_one(
        &self,
        filter: &TodoFilter,
        update: &TodoUpdate,
    ) -> Result<UpdateResult, StoreError> {
        let result = match self.modify_one(filter, update).await? {
            Some((_, modified)) => UpdateResult {
                matched_count: 1,
                modified_count: u64::from(modified),
            },
            None => UpdateResult::default(),
        };
        Ok(result)
    }

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Applies `update` to `todo` in place and reports whether anything changed.
/// `updated_at` is refreshed only on change.
pub fn apply_update(todo: &mut Todo, update: &TodoUpdate) -> Result<bool, StoreError> {
    let changed = match update {
        TodoUpdate::Set(patch) => {
            if let Some(title) = &patch.title {
                todo.title = title.trim().to_string();
            }
            if let Some(description) = &patch.description {
                todo.description = description.clone();
            }
            if let Some(status) = patch.status {
                todo.status = status;
            }
            !patch.is_empty()
        }
        TodoUpdate::InsertSubtask { subtask, position } => {
            match position {
                Some(p) => ordering::insert_at_position(todo, subtask.clone(), *p)?,
                None => ordering::append_to_end(todo, subtask.clone())?,
            }
            true
        }
        TodoUpdate::MoveSubtask { subtask_id, position } => {
            let before = ordering::ordered_ids(todo);
            ordering::move_to_position(todo, subtask_id, *position)
                && before != ordering::ordered_ids(todo)
        }
        TodoUpdate::PullSubtask(subtask_id) => ordering::remove(todo, subtask_id).is_some(),
        TodoUpdate::SetSubtask { subtask_id, patch } => match todo.subtask_mut(subtask_id) {
            Some(subtask) => {
                if let Some(title) = &patch.title {
                    subtask.title = title.trim().to_string();
                }
                if let Some(completed) = patch.completed {
                    subtask.completed = completed;
                }
                subtask.updated_at = chrono::Utc::now();
                true
            }
            None => false,
        },
        TodoUpdate::RepairOrder => {
            if ordering::validate(todo) {
                false
            } else {
                ordering::repair(todo);
                true
            }
        }
    };

    if changed {
        todo.touch();
    }
    Ok(changed)
}
