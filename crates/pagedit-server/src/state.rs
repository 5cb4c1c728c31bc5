//! Server state.

use crate::save::EditSaveService;
use pagedit_snapshot::SnapshotStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Version history of the project.
    pub store: Arc<SnapshotStore>,
    /// Save pipeline; serializes save requests.
    pub saver: Arc<EditSaveService>,
}

impl AppState {
    /// Create a new app state around a snapshot store.
    pub fn new(store: SnapshotStore) -> Self {
        let store = Arc::new(store);
        Self {
            saver: Arc::new(EditSaveService::new(store.clone())),
            store,
        }
    }
}
