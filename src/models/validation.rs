use uuid::Uuid;

use crate::models::{NewTodoRequest, SubtaskPatch, TodoPatch};

pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 1000;

fn check_title(title: &str, required_msg: &str, errors: &mut Vec<String>) {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        errors.push(required_msg.to_string());
    } else if trimmed.chars().count() > TITLE_MAX_LEN {
        errors.push(format!("Title must not exceed {TITLE_MAX_LEN} characters"));
    }
}

fn check_description(description: Option<&str>, errors: &mut Vec<String>) {
    if let Some(d) = description {
        if d.chars().count() > DESCRIPTION_MAX_LEN {
            errors.push(format!(
                "Description must not exceed {DESCRIPTION_MAX_LEN} characters"
            ));
        }
    }
}

fn finish(errors: Vec<String>) -> Result<(), Vec<String>> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

pub fn validate_new_todo(req: &NewTodoRequest) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    check_title(&req.title, "Title is required", &mut errors);
    check_description(req.description.as_deref(), &mut errors);
    for title in &req.subtasks {
        check_title(title, "Subtask title is required", &mut errors);
    }
    finish(errors)
}

pub fn validate_todo_patch(patch: &TodoPatch) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if let Some(title) = &patch.title {
        check_title(title, "Title cannot be empty", &mut errors);
    }
    check_description(patch.description.as_deref(), &mut errors);
    finish(errors)
}

pub fn validate_subtask_title(title: &str) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    check_title(title, "Title is required", &mut errors);
    finish(errors)
}

pub fn validate_subtask_patch(patch: &SubtaskPatch) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if let Some(title) = &patch.title {
        check_title(title, "Title cannot be empty", &mut errors);
    }
    finish(errors)
}

pub fn validate_todo_id(id: &str) -> Result<(), Vec<String>> {
    match Uuid::parse_str(id) {
        Ok(_) => Ok(()),
        Err(_) => Err(vec!["Todo ID must be a valid UUID".to_string()]),
    }
}

pub fn validate_subtask_ids(todo_id: &str, subtask_id: &str) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if Uuid::parse_str(todo_id).is_err() {
        errors.push("Todo ID must be a valid UUID".to_string());
    }
    if Uuid::parse_str(subtask_id).is_err() {
        errors.push("Subtask ID must be a valid UUID".to_string());
    }
    finish(errors)
}
