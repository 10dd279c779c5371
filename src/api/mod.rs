mod extract;

use axum::Json;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Router, extract::State, routing::get};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ApiResponse, AppError};
use crate::models::validation;
use crate::models::*;
use crate::ordering::LinkedListStats;
use crate::services::BulkDeleteResult;
use crate::state::AppState;
use self::extract::{ApiJson, ApiQuery};

#[derive(Deserialize)]
struct TodoQueryParams {
    status: Option<TodoStatus>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedTodo {
    subtasks_deleted: usize,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/todos", get(list_todos).post(create_todo))
        .route("/api/todos/summary", get(list_summaries))
        .route("/api/todos/bulk-delete", post(bulk_delete))
        .route(
            "/api/todos/{id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .route("/api/todos/{id}/stats", get(todo_stats))
        .route("/api/todos/{id}/repair", post(repair_todo))
        .route("/api/todos/{todo_id}/subtasks", post(create_subtask))
        .route(
            "/api/todos/{todo_id}/subtasks/{subtask_id}",
            put(update_subtask).delete(delete_subtask),
        )
        .route(
            "/api/todos/{todo_id}/subtasks/{subtask_id}/position",
            put(move_subtask),
        )
        .fallback(route_not_found)
        .with_state(state)
}

fn check_todo_id(id: &str) -> Result<(), AppError> {
    validation::validate_todo_id(id).map_err(AppError::Validation)
}

fn check_subtask_ids(todo_id: &str, subtask_id: &str) -> Result<(), AppError> {
    validation::validate_subtask_ids(todo_id, subtask_id).map_err(AppError::Validation)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let healthy = state.is_ready() && state.store.ping().await.is_ok();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let label = if healthy { "ok" } else { "unavailable" };
    let body = json!({
        "status": label,
        "timestamp": Utc::now().to_rfc3339(),
        "service": "todo-backend",
    });
    (status, Json(body))
}

async fn route_not_found() -> (StatusCode, Json<ApiResponse<Value>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure("Route not found", None)),
    )
}

async fn list_todos(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<TodoQueryParams>,
) -> ApiResult<Vec<Todo>> {
    let todos = state.todo_service().list_todos(params.status).await?;
    Ok(Json(ApiResponse::ok(todos)))
}

async fn list_summaries(State(state): State<AppState>) -> ApiResult<Vec<TodoSummary>> {
    let summaries = state.todo_service().summaries().await?;
    Ok(Json(ApiResponse::ok(summaries)))
}

async fn get_todo(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Todo> {
    check_todo_id(&id)?;
    let todo = state.todo_service().get_todo_by_id(&id).await?;
    Ok(Json(ApiResponse::ok(todo)))
}

async fn create_todo(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewTodoRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Todo>>), AppError> {
    let todo = state.todo_service().create_todo(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(Some(todo), "Todo created successfully")),
    ))
}

async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateTodoRequest>,
) -> ApiResult<Todo> {
    check_todo_id(&id)?;
    let todo = state.todo_service().update_todo(&id, req).await?;
    Ok(Json(ApiResponse::with_message(Some(todo), "Todo updated successfully")))
}

async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeletedTodo> {
    check_todo_id(&id)?;
    let subtasks_deleted = state.todo_service().delete_todo(&id).await?;
    Ok(Json(ApiResponse::with_message(
        Some(DeletedTodo { subtasks_deleted }),
        "Todo deleted successfully",
    )))
}

async fn bulk_delete(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BulkDeleteRequest>,
) -> ApiResult<BulkDeleteResult> {
    let result = state.todo_service().bulk_delete(&req.ids).await;
    Ok(Json(ApiResponse::ok(result)))
}

async fn todo_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<LinkedListStats> {
    check_todo_id(&id)?;
    let stats = state.todo_service().todo_stats(&id).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

async fn repair_todo(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Todo> {
    check_todo_id(&id)?;
    let todo = state.todo_service().repair_todo(&id).await?;
    Ok(Json(ApiResponse::ok(todo)))
}

async fn create_subtask(
    State(state): State<AppState>,
    Path(todo_id): Path<String>,
    ApiJson(req): ApiJson<NewSubtaskRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Todo>>), AppError> {
    check_todo_id(&todo_id)?;
    let todo = state
        .todo_service()
        .add_subtask(&todo_id, &req.title, req.position)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(Some(todo), "Subtask created successfully")),
    ))
}

async fn update_subtask(
    State(state): State<AppState>,
    Path((todo_id, subtask_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<UpdateSubtaskRequest>,
) -> ApiResult<Subtask> {
    check_subtask_ids(&todo_id, &subtask_id)?;
    let subtask = state
        .todo_service()
        .update_subtask(&todo_id, &subtask_id, req)
        .await?;
    Ok(Json(ApiResponse::with_message(Some(subtask), "Subtask updated successfully")))
}

async fn delete_subtask(
    State(state): State<AppState>,
    Path((todo_id, subtask_id)): Path<(String, String)>,
) -> ApiResult<Todo> {
    check_subtask_ids(&todo_id, &subtask_id)?;
    let todo = state
        .todo_service()
        .remove_subtask(&todo_id, &subtask_id)
        .await?;
    Ok(Json(ApiResponse::with_message(Some(todo), "Subtask deleted successfully")))
}

async fn move_subtask(
    State(state): State<AppState>,
    Path((todo_id, subtask_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<MoveSubtaskRequest>,
) -> ApiResult<Todo> {
    check_subtask_ids(&todo_id, &subtask_id)?;
    let todo = state
        .todo_service()
        .move_subtask(&todo_id, &subtask_id, req.position)
        .await?;
    Ok(Json(ApiResponse::ok(todo)))
}
