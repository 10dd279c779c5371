use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use todo_backend::api::router;
use todo_backend::db::MemoryDocumentStore;
use todo_backend::state::AppState;
use tower::ServiceExt;

fn app(ready: bool) -> Router {
    let store = Arc::new(MemoryDocumentStore::new());
    router(AppState::new(store, Arc::new(AtomicBool::new(ready))))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request"),
        None => builder.body(Body::empty()).expect("Failed to build request"),
    };

    let response = app.clone().oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body is not JSON")
    };
    (status, json)
}

fn ordered_titles(todo: &Value) -> Vec<String> {
    let subtasks = todo["subtasks"].as_array().unwrap();
    let mut titles = Vec::new();
    let mut current = todo["subtaskHead"].as_str().map(str::to_string);
    while let Some(id) = current {
        let subtask = subtasks.iter().find(|s| s["id"] == id.as_str()).unwrap();
        titles.push(subtask["title"].as_str().unwrap().to_string());
        current = subtask["next"].as_str().map(str::to_string);
    }
    titles
}

fn subtask_id(todo: &Value, title: &str) -> String {
    todo["subtasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["title"] == title)
        .and_then(|s| s["id"].as_str())
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health_reflects_readiness() {
    let (status, body) = send(&app(true), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&app(false), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_todo_lifecycle() {
    let app = app(true);

    let (status, body) = send(
        &app,
        "POST",
        "/api/todos",
        Some(json!({ "title": "Groceries", "subtasks": ["Milk", "Eggs", "Bread"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let todo = body["data"].clone();
    let id = todo["id"].as_str().unwrap().to_string();
    assert_eq!(todo["status"], "pending");
    assert_eq!(ordered_titles(&todo), ["Milk", "Eggs", "Bread"]);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/todos/{id}"),
        Some(json!({ "status": "in-progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in-progress");
    assert_eq!(body["data"]["title"], "Groceries");

    let (status, body) = send(&app, "GET", "/api/todos?status=in-progress", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, "DELETE", &format!("/api/todos/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subtasksDeleted"], 3);

    let (status, body) = send(&app, "DELETE", &format!("/api/todos/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Todo not found");
}

#[tokio::test]
async fn test_subtask_ordering_endpoints() {
    let app = app(true);
    let (_, body) = send(
        &app,
        "POST",
        "/api/todos",
        Some(json!({ "title": "Groceries", "subtasks": ["Milk", "Eggs", "Bread"] })),
    )
    .await;
    let todo = body["data"].clone();
    let id = todo["id"].as_str().unwrap().to_string();
    let eggs = subtask_id(&todo, "Eggs");
    let milk = subtask_id(&todo, "Milk");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/todos/{id}/subtasks/{eggs}/position"),
        Some(json!({ "position": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ordered_titles(&body["data"]), ["Eggs", "Milk", "Bread"]);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/todos/{id}/subtasks"),
        Some(json!({ "title": "Butter", "position": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ordered_titles(&body["data"]), ["Eggs", "Butter", "Milk", "Bread"]);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/todos/{id}/subtasks/{milk}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ordered_titles(&body["data"]), ["Eggs", "Butter", "Bread"]);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/todos/{id}/subtasks/{eggs}"),
        Some(json!({ "completed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], true);

    let (status, body) = send(&app, "GET", &format!("/api/todos/{id}/stats"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["arrayLength"], 3);
    assert_eq!(body["data"]["linkedListLength"], 3);
    assert_eq!(body["data"]["isValid"], true);
    assert_eq!(body["data"]["hasOrphanedSubtasks"], false);

    let (status, body) = send(&app, "POST", &format!("/api/todos/{id}/repair"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ordered_titles(&body["data"]).len(), 3);
}

#[tokio::test]
async fn test_missing_subtask_is_not_found() {
    let app = app(true);
    let (_, body) = send(&app, "POST", "/api/todos", Some(json!({ "title": "Solo" }))).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let ghost = uuid::Uuid::new_v4();

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/todos/{id}/subtasks/{ghost}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Subtask not found");

    let missing_todo = uuid::Uuid::new_v4();
    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/todos/{missing_todo}/subtasks/{ghost}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Todo not found");
}

#[tokio::test]
async fn test_validation_failures() {
    let app = app(true);

    let (status, body) = send(&app, "POST", "/api/todos", Some(json!({ "title": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["data"][0], "Title is required");

    let (status, body) = send(&app, "GET", "/api/todos/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"][0], "Todo ID must be a valid UUID");
}

#[tokio::test]
async fn test_malformed_bodies_and_queries_use_the_envelope() {
    let app = app(true);

    let (status, body) = send(&app, "POST", "/api/todos", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["data"], json!(["Title is required"]));

    let (_, created) = send(&app, "POST", "/api/todos", Some(json!({ "title": "Trip" }))).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/todos/{id}/subtasks"),
        Some(json!({ "position": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"], json!(["Title is required"]));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/todos/{id}/subtasks"),
        Some(json!({ "title": "Pack", "position": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    assert!(body["data"][0].is_string());

    let (status, body) = send(&app, "GET", "/api/todos?status=done", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation failed");
}

#[tokio::test]
async fn test_bulk_delete_reports_partial_success() {
    let app = app(true);
    let mut ids = Vec::new();
    for title in ["One", "Two"] {
        let (_, body) = send(&app, "POST", "/api/todos", Some(json!({ "title": title }))).await;
        ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }
    ids.insert(1, "t2".to_string());

    let (status, body) = send(
        &app,
        "POST",
        "/api/todos/bulk-delete",
        Some(json!({ "ids": ids })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deletedCount"], 2);
    assert_eq!(body["data"]["errors"], json!(["Todo t2 not found"]));

    let (_, body) = send(&app, "GET", "/api/todos/summary", None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, body) = send(&app(true), "GET", "/api/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
}
