//! Generation State Store: durable persistence for the one in-flight
//! [`BatchState`].
//!
//! There is at most one writer (the active dispatch loop) and one reader
//! (the resume controller at startup), so the store holds exactly one
//! record and needs no locking beyond what the backend provides.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use hookreel_core::batch_state::BatchState;
use tokio::sync::{watch, Mutex};

/// Errors from a state store backend.
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Single-record persistence for the in-flight batch.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Overwrite the persisted snapshot.
    async fn save(&self, state: &BatchState) -> Result<(), StateStoreError>;

    /// Read the snapshot. Malformed or inconsistent data reads as `None`.
    async fn load(&self) -> Result<Option<BatchState>, StateStoreError>;

    /// Remove the snapshot. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<(), StateStoreError>;
}

/// Decode a persisted record, treating anything unusable as absent.
fn decode(raw: &[u8]) -> Option<BatchState> {
    let state: BatchState = match serde_json::from_slice(raw) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unparseable batch state");
            return None;
        }
    };
    if let Err(e) = state.validate() {
        tracing::warn!(error = %e, "Discarding inconsistent batch state");
        return None;
    }
    Some(state)
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// JSON file store. Writes go to a sibling temp file and are renamed
/// into place, so a crash mid-write leaves the previous snapshot intact.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn save(&self, state: &BatchState) -> Result<(), StateStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<BatchState>, StateStoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(decode(&raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<(), StateStoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Store that keeps the serialized record in memory. Used by tests and
/// when no state path is configured.
#[derive(Default)]
pub struct MemoryStateStore {
    record: Mutex<Option<Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes as the record, bypassing serialization.
    pub async fn put_raw(&self, raw: impl Into<Vec<u8>>) {
        *self.record.lock().await = Some(raw.into());
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, state: &BatchState) -> Result<(), StateStoreError> {
        let json = serde_json::to_vec(state)?;
        *self.record.lock().await = Some(json);
        Ok(())
    }

    async fn load(&self) -> Result<Option<BatchState>, StateStoreError> {
        Ok(self.record.lock().await.as_deref().and_then(decode))
    }

    async fn clear(&self) -> Result<(), StateStoreError> {
        *self.record.lock().await = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Checkpointer
// ---------------------------------------------------------------------------

/// Write-side wrapper used by the dispatch loop.
///
/// Persistence failures are logged and swallowed: the batch keeps
/// running in memory. Every checkpoint is also published on a `watch`
/// channel so the latest snapshot can be read (or force-saved) without
/// touching the backend.
pub struct Checkpointer {
    store: Arc<dyn StateStore>,
    latest: watch::Sender<Option<BatchState>>,
}

impl Checkpointer {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        let (latest, _) = watch::channel(None);
        Self { store, latest }
    }

    /// Receiver for the most recent checkpoint.
    pub fn watch(&self) -> watch::Receiver<Option<BatchState>> {
        self.latest.subscribe()
    }

    pub async fn save(&self, state: &BatchState) {
        self.latest.send_replace(Some(state.clone()));
        if let Err(e) = self.store.save(state).await {
            tracing::warn!(
                error = %e,
                hook_index = state.current_hook_index,
                "Failed to checkpoint batch state",
            );
        }
    }

    /// Re-save the latest checkpoint. Returns `false` when no batch is
    /// in flight.
    pub async fn flush(&self) -> bool {
        let latest = self.latest.borrow().clone();
        match latest {
            Some(state) => {
                self.save(&state).await;
                true
            }
            None => false,
        }
    }

    pub async fn clear(&self) {
        self.latest.send_replace(None);
        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, "Failed to clear batch state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BatchState {
        let mut state = BatchState::start(3);
        state.record_video("https://cdn/v0.mp4");
        state.current_hook_index = 1;
        state.current_media_index = 1;
        state.progress_percent = 35;
        state
    }

    #[tokio::test]
    async fn file_store_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("nested/state.json"));

        assert!(store.load().await.unwrap().is_none());

        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sample()));
        assert!(!store.tmp_path().exists());

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json"));

        store.save(&BatchState::start(5)).await.unwrap();
        store.save(&sample()).await.unwrap();

        assert_eq!(store.load().await.unwrap().unwrap().total_to_generate, 3);
    }

    #[tokio::test]
    async fn malformed_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileStateStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inconsistent_record_reads_as_absent() {
        let store = MemoryStateStore::new();
        store
            .put_raw(
                r#"{"isGenerating":true,"progress":10,"generatedVideos":[],
                    "generatedCount":4,"totalToGenerate":2,
                    "currentHookIndex":0,"currentMediaIndex":0}"#,
            )
            .await;
        assert!(store.load().await.unwrap().is_none());
    }

    struct BrokenStore;

    #[async_trait]
    impl StateStore for BrokenStore {
        async fn save(&self, _state: &BatchState) -> Result<(), StateStoreError> {
            Err(std::io::Error::other("disk full").into())
        }

        async fn load(&self) -> Result<Option<BatchState>, StateStoreError> {
            Err(std::io::Error::other("disk gone").into())
        }

        async fn clear(&self) -> Result<(), StateStoreError> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    #[tokio::test]
    async fn checkpointer_swallows_backend_errors() {
        let checkpointer = Checkpointer::new(Arc::new(BrokenStore));
        let rx = checkpointer.watch();

        checkpointer.save(&sample()).await;
        assert_eq!(*rx.borrow(), Some(sample()));

        checkpointer.clear().await;
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn flush_resaves_latest_checkpoint() {
        let store = Arc::new(MemoryStateStore::new());
        let checkpointer = Checkpointer::new(store.clone());
        assert!(!checkpointer.flush().await);

        checkpointer.save(&sample()).await;
        store.clear().await.unwrap();

        assert!(checkpointer.flush().await);
        assert_eq!(store.load().await.unwrap(), Some(sample()));
    }
}
