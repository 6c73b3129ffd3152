//! Durable object storage client.
//!
//! Stored media is addressed by an opaque key. `put` generates the key;
//! `get` returns the bytes together with their content type so callers
//! can rebuild an inline payload.

use async_trait::async_trait;
use uuid::Uuid;

/// Content type assumed when storage does not report one.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Bytes read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Errors from the object storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Storage error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Object not found: {0}")]
    NotFound(String),
}

/// `put(bytes) -> key`, `get(key) -> bytes`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;
}

/// Object storage reached over plain HTTP `GET`/`PUT` on `{base}/{key}`.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    async fn ensure_success(
        key: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StorageError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let key = Uuid::new_v4().to_string();
        let response = self
            .client
            .put(self.object_url(&key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        Self::ensure_success(&key, response).await?;

        tracing::debug!(key = %key, "Stored object");
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let response = self.client.get(self.object_url(key)).send().await?;
        let response = Self::ensure_success(key, response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
        let bytes = response.bytes().await?.to_vec();

        Ok(StoredObject {
            bytes,
            content_type,
        })
    }
}
