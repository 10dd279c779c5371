use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use todo_backend::api::router;
use todo_backend::config::{AppConfig, StoreBackend};
use todo_backend::db::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};
use todo_backend::state::AppState;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => warn!("failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down gracefully");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "todo_backend=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;
    let ready = Arc::new(AtomicBool::new(false));

    let (store, sqlite): (Arc<dyn DocumentStore>, Option<Arc<SqliteDocumentStore>>) =
        match config.store_backend {
            StoreBackend::Sqlite => {
                let sqlite = Arc::new(SqliteDocumentStore::connect(&config).await?);
                sqlite.migrate().await?;
                let shared: Arc<dyn DocumentStore> = sqlite.clone();
                (shared, Some(sqlite))
            }
            StoreBackend::Memory => {
                warn!("using in-memory store, data is lost on exit");
                let shared: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
                (shared, None)
            }
        };
    ready.store(true, Ordering::Release);

    let app = router(AppState::new(store, ready.clone()));

    let addr = config.addr();
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ready.store(false, Ordering::Release);
    if let Some(sqlite) = sqlite {
        sqlite.disconnect().await;
    }

    Ok(())
}
