//! Normalise media references into inline payloads.

use std::sync::Arc;

use hookreel_core::error::CoreError;
use hookreel_core::media::{DataUrl, Locator, MediaReference};
use hookreel_render::storage::{ObjectStore, StorageError};

use crate::uploads::UploadCache;

/// Why a media reference could not be turned into an inline payload.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Upload {0} is no longer available")]
    UploadMissing(String),

    #[error("Failed to fetch stored media {key}: {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Invalid inline payload: {0}")]
    InvalidPayload(#[from] CoreError),
}

/// Dereferences ephemeral handles and storage keys.
#[derive(Clone)]
pub struct MediaResolver {
    uploads: Arc<UploadCache>,
    storage: Arc<dyn ObjectStore>,
}

impl MediaResolver {
    pub fn new(uploads: Arc<UploadCache>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { uploads, storage }
    }

    /// Return an equivalent reference whose locator is inline.
    ///
    /// Inline references are checked for decodability and passed through
    /// unchanged. Fetched ones take their kind from the fetched MIME type.
    pub async fn resolve(&self, media: &MediaReference) -> Result<MediaReference, ResolveError> {
        let data_url = match &media.locator {
            Locator::Inline(raw) => {
                DataUrl::parse(raw)?;
                return Ok(media.clone());
            }
            Locator::Ephemeral(handle) => {
                let upload = self
                    .uploads
                    .get(handle)
                    .await
                    .ok_or_else(|| ResolveError::UploadMissing(handle.clone()))?;
                DataUrl::new(upload.content_type, upload.bytes)
            }
            Locator::Storage(key) => {
                let object = self
                    .storage
                    .get(key)
                    .await
                    .map_err(|source| ResolveError::Storage {
                        key: key.clone(),
                        source,
                    })?;
                DataUrl::new(object.content_type, object.bytes)
            }
        };

        tracing::debug!(
            from = %media.locator,
            mime = %data_url.mime,
            size = data_url.bytes.len(),
            "Resolved media to inline payload",
        );

        Ok(MediaReference {
            kind: data_url.kind(),
            locator: Locator::Inline(data_url.encode()),
            duration_seconds: media.duration_seconds,
            aspect_ratio: media.aspect_ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use hookreel_core::media::MediaKind;
    use hookreel_render::storage::StoredObject;

    use super::*;

    struct MapStore(HashMap<String, StoredObject>);

    #[async_trait]
    impl ObjectStore for MapStore {
        async fn put(&self, _bytes: Vec<u8>, _content_type: &str) -> Result<String, StorageError> {
            unreachable!("resolver never writes")
        }

        async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
            self.0
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(key.to_string()))
        }
    }

    fn resolver(objects: &[(&str, &str, &[u8])]) -> (MediaResolver, Arc<UploadCache>) {
        let map = objects
            .iter()
            .map(|(k, mime, bytes)| {
                (
                    k.to_string(),
                    StoredObject {
                        bytes: bytes.to_vec(),
                        content_type: mime.to_string(),
                    },
                )
            })
            .collect();
        let uploads = Arc::new(UploadCache::new());
        (
            MediaResolver::new(uploads.clone(), Arc::new(MapStore(map))),
            uploads,
        )
    }

    #[tokio::test]
    async fn upload_handle_becomes_inline_with_mime_kind() {
        let (resolver, uploads) = resolver(&[]);
        let handle = uploads.insert(b"frames".to_vec(), "video/mp4").await.unwrap();
        let media = MediaReference::new(MediaKind::Image, Locator::Ephemeral(handle))
            .with_duration(6.0);

        let resolved = resolver.resolve(&media).await.unwrap();

        assert!(resolved.locator.is_inline());
        assert_eq!(resolved.kind, MediaKind::Video);
        assert_eq!(resolved.duration_seconds, Some(6.0));
        let decoded = DataUrl::parse(resolved.locator.as_str()).unwrap();
        assert_eq!(decoded.bytes, b"frames");
    }

    #[tokio::test]
    async fn storage_key_is_dereferenced() {
        let (resolver, _) = resolver(&[("users/1/t.png", "image/png", b"png")]);
        let media = MediaReference::new(MediaKind::Image, Locator::Storage("users/1/t.png".into()));

        let resolved = resolver.resolve(&media).await.unwrap();
        assert!(resolved
            .locator
            .as_str()
            .starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn inline_passes_through_unchanged() {
        let (resolver, _) = resolver(&[]);
        let url = DataUrl::new("image/jpeg", b"jpg".to_vec()).encode();
        let media = MediaReference::new(MediaKind::Image, Locator::Inline(url));

        assert_eq!(resolver.resolve(&media).await.unwrap(), media);
    }

    #[tokio::test]
    async fn failures_are_reported() {
        let (resolver, _) = resolver(&[]);

        let missing_upload = MediaReference::new(MediaKind::Image, Locator::Ephemeral("blob:gone".into()));
        assert_matches!(
            resolver.resolve(&missing_upload).await,
            Err(ResolveError::UploadMissing(_))
        );

        let missing_key = MediaReference::new(MediaKind::Image, Locator::Storage("nope".into()));
        assert_matches!(
            resolver.resolve(&missing_key).await,
            Err(ResolveError::Storage { .. })
        );

        let garbage = MediaReference::new(MediaKind::Image, Locator::Inline("data:image/png;base64,%%".into()));
        assert_matches!(
            resolver.resolve(&garbage).await,
            Err(ResolveError::InvalidPayload(_))
        );
    }
}
