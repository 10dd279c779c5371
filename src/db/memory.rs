use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::{DocumentStore, TodoFilter, TodoUpdate, apply_update};
use crate::error::StoreError;
use crate::models::Todo;

/// In-process store keeping documents in insertion order. The write lock
/// makes each update a single atomic read-modify-write.
#[derive(Default)]
pub struct MemoryDocumentStore {
    todos: RwLock<Vec<Todo>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.todos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.todos.read().await.is_empty()
    }

    /// Writes a document as-is, bypassing every update rule.
    pub async fn put_raw(&self, todo: Todo) {
        let mut todos = self.todos.write().await;
        match todos.iter_mut().find(|t| t.id == todo.id) {
            Some(existing) => *existing = todo,
            None => todos.push(todo),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError> {
        let todos = self.todos.read().await;
        Ok(todos.iter().filter(|t| filter.matches(t)).cloned().collect())
    }

    async fn find_one(&self, filter: &TodoFilter) -> Result<Option<Todo>, StoreError> {
        let todos = self.todos.read().await;
        Ok(todos.iter().find(|t| filter.matches(t)).cloned())
    }

    async fn insert(&self, todo: Todo) -> Result<Todo, StoreError> {
        let mut todos = self.todos.write().await;
        if todos.iter().any(|t| t.id == todo.id) {
            return Err(StoreError::Constraint(format!("Todo {} already exists", todo.id)));
        }
        todos.push(todo.clone());
        Ok(todo)
    }

    async fn modify_one(
        &self,
        filter: &TodoFilter,
        update: &TodoUpdate,
    ) -> Result<Option<(Todo, bool)>, StoreError> {
        let mut todos = self.todos.write().await;
        let Some(todo) = todos.iter_mut().find(|t| filter.matches(t)) else {
            return Ok(None);
        };

        let mut working = todo.clone();
        let modified = apply_update(&mut working, update)?;
        *todo = working.clone();
        Ok(Some((working, modified)))
    }

    async fn delete_one(&self, filter: &TodoFilter) -> Result<u64, StoreError> {
        let mut todos = self.todos.write().await;
        match todos.iter().position(|t| filter.matches(t)) {
            Some(idx) => {
                todos.remove(idx);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
