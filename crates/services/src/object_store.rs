use async_trait::async_trait;
use mediascribe_config::ObjectStoreSettings;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("object store returned {0}")]
    Status(reqwest::StatusCode),
}

/// Content-addressable blob storage. The platform keeps only URLs; bytes
/// live here.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the bytes and returns the object's URL.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError>;

    /// Best-effort delete; callers log failures and move on.
    async fn delete(&self, url: &str) -> Result<(), ObjectStoreError>;
}

/// Client for an S3-style HTTP gateway: PUT/DELETE against
/// `{endpoint}/{bucket}/{key}` with a bearer key.
pub struct HttpObjectStore {
    settings: ObjectStoreSettings,
    client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(settings: &ObjectStoreSettings) -> Self {
        Self {
            settings: settings.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.settings.endpoint, self.settings.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        let url = self.object_url(key);
        let resp = self
            .client
            .put(&url)
            .bearer_auth(&self.settings.api_key)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ObjectStoreError::Status(resp.status()));
        }

        debug!(%url, "Stored object");
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), ObjectStoreError> {
        let resp = self
            .client
            .delete(url)
            .bearer_auth(&self.settings.api_key)
            .send()
            .await?;

        // Idempotent: the object being gone already is fine.
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::Status(resp.status()));
        }

        debug!(%url, "Deleted object");
        Ok(())
    }
}
