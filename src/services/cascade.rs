use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::db::{DocumentStore, TodoFilter};
use crate::error::StoreError;
use crate::models::Todo;

/// Removes todos together with everything they own.
///
/// Subtasks live inside the todo document, so deleting the document is the
/// whole cascade: a todo is either fully present or fully gone.
pub struct CascadeDeleter {
    store: Arc<dyn DocumentStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    NotFound,
    Deleted { subtasks_deleted: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResult {
    pub deleted_count: usize,
    pub errors: Vec<String>,
}

impl CascadeDeleter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn delete_todo_and_subtasks(&self, todo_id: &str) -> Result<DeleteOutcome, StoreError> {
        self.find_and_delete(&TodoFilter::id(todo_id)).await
    }

    /// Deletes the first todo matching `filter`.
    pub async fn find_and_delete(&self, filter: &TodoFilter) -> Result<DeleteOutcome, StoreError> {
        match self.store.find_one(filter).await? {
            Some(todo) => self.delete_instance(&todo).await,
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    /// Deletes an already loaded todo. The reported subtask count is taken
    /// from the loaded copy.
    pub async fn delete_instance(&self, todo: &Todo) -> Result<DeleteOutcome, StoreError> {
        info!(
            "cascade delete for todo {} ({} subtasks)",
            todo.id,
            todo.subtasks.len()
        );

        let deleted = self.store.delete_one(&TodoFilter::id(&todo.id)).await?;
        if deleted == 0 {
            warn!("todo {} disappeared before it could be deleted", todo.id);
            return Ok(DeleteOutcome::NotFound);
        }

        Ok(DeleteOutcome::Deleted {
            subtasks_deleted: todo.subtasks.len(),
        })
    }

    /// Deletes each id in turn. Failures are collected, never fatal.
    pub async fn bulk_delete(&self, todo_ids: &[String]) -> BulkDeleteResult {
        let mut result = BulkDeleteResult::default();

        for todo_id in todo_ids {
            match self.delete_todo_and_subtasks(todo_id).await {
                Ok(DeleteOutcome::Deleted { .. }) => result.deleted_count += 1,
                Ok(DeleteOutcome::NotFound) => {
                    result.errors.push(format!("Todo {todo_id} not found"));
                }
                Err(e) => {
                    warn!("bulk delete failed for {}: {}", todo_id, e);
                    result
                        .errors
                        .push(format!("Failed to delete todo {todo_id}: {e}"));
                }
            }
        }

        info!(
            "bulk delete finished: {} deleted, {} errors",
            result.deleted_count,
            result.errors.len()
        );
        result
    }
}
