use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::db::{DocumentStore, TodoFilter, TodoUpdate, apply_update};
use crate::error::StoreError;
use crate::models::Todo;

/// Stores every todo as a JSON document in the `todos` table. `status` and
/// the timestamps are mirrored into columns for filtering and ordering.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

/// How long a writer waits for the database lock before giving up.
const BUSY_TIMEOUT_SECS: u64 = 5;

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn where_clause(filter: &TodoFilter) -> (&'static str, Option<String>) {
    match filter {
        TodoFilter::All => ("", None),
        TodoFilter::Id(id) => (" WHERE id = ?", Some(id.clone())),
        TodoFilter::Status(status) => (" WHERE status = ?", Some(status.as_str().to_string())),
    }
}

fn map_insert_error(err: sqlx::Error, id: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Constraint(format!("Todo {id} already exists"))
        }
        _ => StoreError::Database(err),
    }
}

async fn select_first(
    conn: &mut SqliteConnection,
    filter: &TodoFilter,
) -> Result<Option<Todo>, StoreError> {
    let (clause, param) = where_clause(filter);
    let sql = format!("SELECT doc FROM todos{clause} ORDER BY created_at, rowid LIMIT 1");
    let mut query = sqlx::query_scalar::<_, String>(&sql);
    if let Some(param) = param {
        query = query.bind(param);
    }

    match query.fetch_optional(&mut *conn).await? {
        Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
        None => Ok(None),
    }
}

async fn write_doc(conn: &mut SqliteConnection, todo: &Todo) -> Result<(), StoreError> {
    let doc = serde_json::to_string(todo)?;
    sqlx::query(
        r#"
        UPDATE todos
        SET status = ?1,
            doc = ?2,
            updated_at = ?3
        WHERE id = ?4
        "#,
    )
    .bind(todo.status.as_str())
    .bind(doc)
    .bind(timestamp(&todo.updated_at))
    .bind(&todo.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl SqliteDocumentStore {
    pub async fn connect(config: &AppConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        info!("connected to {}", config.database_url);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(self.pool()?).await?;
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.pool.close().await;
        info!("database connection closed");
    }

    fn pool(&self) -> Result<&SqlitePool, StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Disconnected);
        }
        Ok(&self.pool)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find(&self, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError> {
        let (clause, param) = where_clause(filter);
        let sql = format!("SELECT doc FROM todos{clause} ORDER BY created_at, rowid");
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        if let Some(param) = param {
            query = query.bind(param);
        }

        let docs = query.fetch_all(self.pool()?).await?;
        docs.iter()
            .map(|doc| serde_json::from_str(doc).map_err(StoreError::from))
            .collect()
    }

    async fn find_one(&self, filter: &TodoFilter) -> Result<Option<Todo>, StoreError> {
        let mut conn = self.pool()?.acquire().await?;
        select_first(&mut *conn, filter).await
    }

    async fn insert(&self, todo: Todo) -> Result<Todo, StoreError> {
        let doc = serde_json::to_string(&todo)?;
        sqlx::query(
            r#"
            INSERT INTO todos
                (id, status, doc, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&todo.id)
        .bind(todo.status.as_str())
        .bind(doc)
        .bind(timestamp(&todo.created_at))
        .bind(timestamp(&todo.updated_at))
        .execute(self.pool()?)
        .await
        .map_err(|e| map_insert_error(e, &todo.id))?;

        debug!("inserted todo {}", todo.id);
        Ok(todo)
    }

    async fn modify_one(
        &self,
        filter: &TodoFilter,
        update: &TodoUpdate,
    ) -> Result<Option<(Todo, bool)>, StoreError> {
        // Take the write lock before reading so concurrent writers queue on
        // the busy timeout instead of failing to upgrade a read lock.
        let mut tx = self.pool()?.begin_with("BEGIN IMMEDIATE").await?;
        let Some(mut todo) = select_first(&mut *tx, filter).await? else {
            return Ok(None);
        };

        let modified = apply_update(&mut todo, update)?;
        if modified {
            write_doc(&mut *tx, &todo).await?;
        }
        tx.commit().await?;
        Ok(Some((todo, modified)))
    }

    async fn delete_one(&self, filter: &TodoFilter) -> Result<u64, StoreError> {
        let (clause, param) = where_clause(filter);
        let sql = format!(
            "DELETE FROM todos WHERE id = (SELECT id FROM todos{clause} ORDER BY created_at, rowid LIMIT 1)"
        );
        let mut query = sqlx::query(&sql);
        if let Some(param) = param {
            query = query.bind(param);
        }

        let result = query.execute(self.pool()?).await?.rows_affected();
        Ok(result)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("select 1").execute(self.pool()?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{Subtask, TodoPatch, TodoStatus};
    use crate::ordering;

    async fn setup_test_db() -> SqliteDocumentStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test db");

        let store = SqliteDocumentStore::from_pool(pool);
        store.migrate().await.expect("Failed to run migrations");
        store
    }

    fn groceries() -> Todo {
        let mut todo = Todo::new("Groceries", "weekly run");
        for title in ["Milk", "Eggs", "Bread"] {
            ordering::append_to_end(&mut todo, Subtask::new(title)).unwrap();
        }
        todo
    }

    #[tokio::test]
    async fn test_insert_and_fetch_todo() {
        let store = setup_test_db().await;
        let todo = store.insert(groceries()).await.expect("Failed to insert todo");

        let fetched = store
            .find_one(&TodoFilter::id(&todo.id))
            .await
            .expect("Failed to fetch todo")
            .expect("Todo not found");
        assert_eq!(fetched, todo);

        let all = store.find(&TodoFilter::All).await.expect("Failed to fetch todos");
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_constraint_violation() {
        let store = setup_test_db().await;
        let todo = store.insert(groceries()).await.unwrap();

        let err = store.insert(todo).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_update_todo() {
        let store = setup_test_db().await;
        let todo = store.insert(groceries()).await.unwrap();

        let patch = TodoPatch {
            status: Some(TodoStatus::Completed),
            ..Default::default()
        };
        let updated = store
            .find_one_and_update(&TodoFilter::id(&todo.id), &TodoUpdate::Set(patch))
            .await
            .expect("Failed to update todo")
            .expect("Todo not found");
        assert_eq!(updated.status, TodoStatus::Completed);
        assert_eq!(updated.title, "Groceries");

        let completed = store.find(&TodoFilter::Status(TodoStatus::Completed)).await.unwrap();
        assert_eq!(completed.len(), 1);
        let pending = store.find(&TodoFilter::Status(TodoStatus::Pending)).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_subtask_updates_keep_chain_valid() {
        let store = setup_test_db().await;
        let todo = store.insert(groceries()).await.unwrap();
        let filter = TodoFilter::id(&todo.id);
        let milk = todo.subtasks[0].id.clone();

        let result = store
            .update_one(&filter, &TodoUpdate::PullSubtask(milk.clone()))
            .await
            .unwrap();
        assert_eq!(result.modified_count, 1);

        let stored = store.find_one(&filter).await.unwrap().unwrap();
        let titles: Vec<_> = ordering::ordered(&stored).map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Eggs", "Bread"]);
        assert!(ordering::validate(&stored));

        let again = store
            .update_one(&filter, &TodoUpdate::PullSubtask(milk))
            .await
            .unwrap();
        assert_eq!(again.matched_count, 1);
        assert_eq!(again.modified_count, 0);
    }

    #[tokio::test]
    async fn test_delete_one() {
        let store = setup_test_db().await;
        let todo = store.insert(groceries()).await.unwrap();
        let filter = TodoFilter::id(&todo.id);

        assert_eq!(store.delete_one(&filter).await.unwrap(), 1);
        assert!(store.find_one(&filter).await.unwrap().is_none());
        assert_eq!(store.delete_one(&filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_store_reports_error() {
        let store = setup_test_db().await;
        store.disconnect().await;

        assert!(matches!(store.ping().await, Err(StoreError::Disconnected)));
        assert!(matches!(
            store.find(&TodoFilter::All).await,
            Err(StoreError::Disconnected)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_on_file_database_all_apply() {
        let path = std::env::temp_dir().join(format!("todo-backend-{}.db", uuid::Uuid::new_v4()));
        let config = AppConfig {
            database_url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 5,
            ..Default::default()
        };
        let store = Arc::new(SqliteDocumentStore::connect(&config).await.unwrap());
        store.migrate().await.unwrap();
        let todo = store.insert(Todo::new("Busy", "")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let filter = TodoFilter::id(&todo.id);
            handles.push(tokio::spawn(async move {
                let update = TodoUpdate::InsertSubtask {
                    subtask: Subtask::new(format!("Step {i}")),
                    position: None,
                };
                store.find_one_and_update(&filter, &update).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let stored = store.find_one(&TodoFilter::id(&todo.id)).await.unwrap().unwrap();
        assert_eq!(stored.subtasks.len(), 20);
        assert!(ordering::validate(&stored));

        store.disconnect().await;
        let _ = std::fs::remove_file(&path);
    }
}
