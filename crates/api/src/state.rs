use std::sync::Arc;

use hookreel_events::{EventBus, ProgressChannel};
use hookreel_pipeline::{StateStore, UploadCache};
use hookreel_render::{ObjectStore, RenderService};

use crate::config::ServerConfig;
use crate::engine::BatchManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The global progress value and its subscribers.
    pub progress: Arc<ProgressChannel>,
    /// Batch lifecycle notifications.
    pub events: Arc<EventBus>,
    /// Bytes behind `blob:` upload handles.
    pub uploads: Arc<UploadCache>,
    /// Owner of the single in-flight batch.
    pub batches: Arc<BatchManager>,
}

impl AppState {
    /// Wire the services together around the given collaborators.
    pub fn new(
        config: ServerConfig,
        render: Arc<dyn RenderService>,
        storage: Arc<dyn ObjectStore>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let progress = Arc::new(ProgressChannel::new());
        let events = Arc::new(EventBus::default());
        let uploads = Arc::new(UploadCache::with_limits(config.upload_limits()));
        let batches = Arc::new(BatchManager::new(
            render,
            storage,
            store,
            Arc::clone(&uploads),
            Arc::clone(&progress),
            Arc::clone(&events),
            config.dispatch_config(),
        ));

        Self {
            config: Arc::new(config),
            progress,
            events,
            uploads,
            batches,
        }
    }
}
