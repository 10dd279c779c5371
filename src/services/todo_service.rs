use std::sync::Arc;

use tracing::{debug, info};

use crate::db::{DocumentStore, TodoFilter, TodoUpdate};
use crate::error::{AppError, StoreError};
use crate::models::validation;
use crate::models::{NewTodoRequest, Subtask, SubtaskPatch, Todo, TodoPatch, TodoStatus, TodoSummary};
use crate::ordering::{self, LinkedListStats};
use crate::services::cascade::{BulkDeleteResult, CascadeDeleter, DeleteOutcome};

/// Operations the HTTP layer relies on.
///
/// Unknown todo ids and unknown subtask ids both come back as
/// `AppError::NotFound`; store failures pass through untouched.
pub struct TodoService {
    store: Arc<dyn DocumentStore>,
}

impl TodoService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn cascade(&self) -> CascadeDeleter {
        CascadeDeleter::new(self.store.clone())
    }

    pub async fn list_todos(&self, status: Option<TodoStatus>) -> Result<Vec<Todo>, AppError> {
        let filter = match status {
            Some(status) => TodoFilter::Status(status),
            None => TodoFilter::All,
        };
        Ok(self.store.find(&filter).await?)
    }

    pub async fn summaries(&self) -> Result<Vec<TodoSummary>, AppError> {
        let todos = self.store.find(&TodoFilter::All).await?;
        Ok(todos.iter().map(TodoSummary::from).collect())
    }

    pub async fn get_todo_by_id(&self, id: &str) -> Result<Todo, AppError> {
        self.store
            .find_one(&TodoFilter::id(id))
            .await?
            .ok_or_else(AppError::todo_not_found)
    }

    pub async fn create_todo(&self, req: NewTodoRequest) -> Result<Todo, AppError> {
        validation::validate_new_todo(&req).map_err(AppError::Validation)?;

        let mut todo = Todo::new(req.title.trim(), req.description.unwrap_or_default());
        todo.status = req.status.unwrap_or_default();
        for title in &req.subtasks {
            ordering::append_to_end(&mut todo, Subtask::new(title.trim()))
                .map_err(StoreError::from)?;
        }

        let todo = self.store.insert(todo).await?;
        info!("created todo {} with {} subtasks", todo.id, todo.subtasks.len());
        Ok(todo)
    }

    pub async fn update_todo(&self, id: &str, patch: TodoPatch) -> Result<Todo, AppError> {
        validation::validate_todo_patch(&patch).map_err(AppError::Validation)?;

        let todo = self
            .store
            .find_one_and_update(&TodoFilter::id(id), &TodoUpdate::Set(patch))
            .await?
            .ok_or_else(AppError::todo_not_found)?;
        debug!("updated todo {}", todo.id);
        Ok(todo)
    }

    /// Returns the number of subtasks removed with the todo.
    pub async fn delete_todo(&self, id: &str) -> Result<usize, AppError> {
        match self.cascade().delete_todo_and_subtasks(id).await? {
            DeleteOutcome::Deleted { subtasks_deleted } => Ok(subtasks_deleted),
            DeleteOutcome::NotFound => Err(AppError::todo_not_found()),
        }
    }

    pub async fn bulk_delete(&self, ids: &[String]) -> BulkDeleteResult {
        self.cascade().bulk_delete(ids).await
    }

    /// Appends a subtask, or inserts it at `position` in the logical order.
    pub async fn add_subtask(
        &self,
        todo_id: &str,
        title: &str,
        position: Option<usize>,
    ) -> Result<Todo, AppError> {
        validation::validate_subtask_title(title).map_err(AppError::Validation)?;

        let update = TodoUpdate::InsertSubtask {
            subtask: Subtask::new(title.trim()),
            position,
        };
        let todo = self
            .store
            .find_one_and_update(&TodoFilter::id(todo_id), &update)
            .await?
            .ok_or_else(AppError::todo_not_found)?;
        debug!("added subtask to todo {}", todo_id);
        Ok(todo)
    }

    pub async fn move_subtask(
        &self,
        todo_id: &str,
        subtask_id: &str,
        position: usize,
    ) -> Result<Todo, AppError> {
        let update = TodoUpdate::MoveSubtask {
            subtask_id: subtask_id.to_string(),
            position,
        };
        let todo = self
            .store
            .find_one_and_update(&TodoFilter::id(todo_id), &update)
            .await?
            .ok_or_else(AppError::todo_not_found)?;

        if todo.subtask(subtask_id).is_none() {
            return Err(AppError::subtask_not_found());
        }
        Ok(todo)
    }

    pub async fn remove_subtask(&self, todo_id: &str, subtask_id: &str) -> Result<Todo, AppError> {
        let (todo, removed) = self
            .store
            .modify_one(
                &TodoFilter::id(todo_id),
                &TodoUpdate::PullSubtask(subtask_id.to_string()),
            )
            .await?
            .ok_or_else(AppError::todo_not_found)?;

        if !removed {
            return Err(AppError::subtask_not_found());
        }
        debug!("removed subtask {} from todo {}", subtask_id, todo_id);
        Ok(todo)
    }

    pub async fn update_subtask(
        &self,
        todo_id: &str,
        subtask_id: &str,
        patch: SubtaskPatch,
    ) -> Result<Subtask, AppError> {
        validation::validate_subtask_patch(&patch).map_err(AppError::Validation)?;

        let not_found = || AppError::NotFound("Todo or subtask not found".to_string());
        let update = TodoUpdate::SetSubtask {
            subtask_id: subtask_id.to_string(),
            patch,
        };
        let todo = self
            .store
            .find_one_and_update(&TodoFilter::id(todo_id), &update)
            .await?
            .ok_or_else(not_found)?;

        todo.subtask(subtask_id).cloned().ok_or_else(not_found)
    }

    pub async fn validate_todo(&self, todo_id: &str) -> Result<bool, AppError> {
        let todo = self.get_todo_by_id(todo_id).await?;
        Ok(ordering::validate(&todo))
    }

    pub async fn repair_todo(&self, todo_id: &str) -> Result<Todo, AppError> {
        let todo = self
            .store
            .find_one_and_update(&TodoFilter::id(todo_id), &TodoUpdate::RepairOrder)
            .await?
            .ok_or_else(AppError::todo_not_found)?;
        info!("repaired subtask order of todo {}", todo_id);
        Ok(todo)
    }

    pub async fn todo_stats(&self, todo_id: &str) -> Result<LinkedListStats, AppError> {
        let todo = self.get_todo_by_id(todo_id).await?;
        Ok(Self::get_linked_list_stats(&todo))
    }

    pub fn get_linked_list_stats(todo: &Todo) -> LinkedListStats {
        ordering::stats(todo)
    }
}
