pub mod cascade;
pub mod todo_service;

pub use cascade::{BulkDeleteResult, CascadeDeleter, DeleteOutcome};
pub use todo_service::TodoService;
