//! Process-local cache behind `blob:` upload handles.
//!
//! Handles only live as long as the process; after a restart every
//! `blob:` locator dangles and has to be re-uploaded. The cache is bounded
//! by total bytes and by entry age: inserting past the byte cap evicts the
//! oldest uploads first, and an entry older than the TTL is dropped.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use hookreel_core::media::EPHEMERAL_PREFIX;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

/// Default total size of all cached uploads (1 GiB).
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024 * 1024;
/// Default lifetime of an upload handle.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Raw bytes of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Upload of {size} bytes exceeds the {limit} byte cache limit")]
    TooLarge { size: usize, limit: usize },
}

/// Bounds applied to an [`UploadCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: usize,
    pub ttl: Duration,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            ttl: DEFAULT_TTL,
        }
    }
}

struct Entry {
    upload: Upload,
    stored_at: Instant,
}

#[derive(Default)]
struct Entries {
    by_handle: HashMap<String, Entry>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
    total_bytes: usize,
}

impl Entries {
    fn remove(&mut self, handle: &str) -> Option<Upload> {
        let entry = self.by_handle.remove(handle)?;
        self.order.retain(|h| h != handle);
        self.total_bytes -= entry.upload.bytes.len();
        Some(entry.upload)
    }

    fn pop_oldest(&mut self) -> Option<(String, usize)> {
        let handle = self.order.pop_front()?;
        let entry = self.by_handle.remove(&handle)?;
        let size = entry.upload.bytes.len();
        self.total_bytes -= size;
        Some((handle, size))
    }

    fn drop_expired(&mut self, ttl: Duration, now: Instant) {
        while let Some(handle) = self.order.front() {
            let expired = self
                .by_handle
                .get(handle)
                .is_some_and(|e| now.duration_since(e.stored_at) >= ttl);
            if !expired {
                break;
            }
            if let Some((handle, size)) = self.pop_oldest() {
                tracing::debug!(handle = %handle, size, "Upload expired");
            }
        }
    }
}

/// In-memory upload store keyed by `blob:<uuid>` handle.
#[derive(Default)]
pub struct UploadCache {
    entries: RwLock<Entries>,
    limits: UploadLimits,
}

impl UploadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: UploadLimits) -> Self {
        Self {
            entries: RwLock::default(),
            limits,
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    /// Store an upload and return its ephemeral handle, evicting the
    /// oldest uploads until it fits.
    pub async fn insert(
        &self,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Result<String, UploadError> {
        let size = bytes.len();
        if size > self.limits.max_bytes {
            return Err(UploadError::TooLarge {
                size,
                limit: self.limits.max_bytes,
            });
        }

        let handle = format!("{EPHEMERAL_PREFIX}{}", Uuid::new_v4());
        let upload = Upload {
            bytes,
            content_type: content_type.into(),
        };
        tracing::debug!(
            handle = %handle,
            size,
            content_type = %upload.content_type,
            "Upload cached",
        );

        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.drop_expired(self.limits.ttl, now);
        while entries.total_bytes + size > self.limits.max_bytes {
            let Some((evicted, evicted_size)) = entries.pop_oldest() else {
                break;
            };
            tracing::info!(handle = %evicted, size = evicted_size, "Upload evicted");
        }

        entries.total_bytes += size;
        entries.order.push_back(handle.clone());
        entries.by_handle.insert(
            handle.clone(),
            Entry {
                upload,
                stored_at: now,
            },
        );
        Ok(handle)
    }

    /// An expired upload reads as missing.
    pub async fn get(&self, handle: &str) -> Option<Upload> {
        let entries = self.entries.read().await;
        let entry = entries.by_handle.get(handle)?;
        if entry.stored_at.elapsed() >= self.limits.ttl {
            return None;
        }
        Some(entry.upload.clone())
    }

    pub async fn remove(&self, handle: &str) -> Option<Upload> {
        self.entries.write().await.remove(handle)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.by_handle.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.by_handle.is_empty()
    }

    /// Bytes currently held.
    pub async fn total_bytes(&self) -> usize {
        self.entries.read().await.total_bytes
    }
}
