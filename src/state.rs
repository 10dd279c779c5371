use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::db::DocumentStore;
use crate::services::TodoService;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    /// Set by `main` once the store is connected and migrated, cleared on shutdown.
    pub ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, ready: Arc<AtomicBool>) -> Self {
        Self { store, ready }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn todo_service(&self) -> TodoService {
        TodoService::new(self.store.clone())
    }
}
