pub mod todo;
pub mod validation;

pub use todo::{
    BulkDeleteRequest, MoveSubtaskRequest, NewSubtaskRequest, NewTodoRequest, Subtask,
    SubtaskPatch, Todo, TodoPatch, TodoStatus, TodoSummary, UpdateSubtaskRequest,
    UpdateTodoRequest,
};
