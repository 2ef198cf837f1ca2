//! Google Cloud Storage via the JSON API.
//!
//! Authentication is a pre-issued OAuth2 bearer token (for example from
//! `gcloud auth print-access-token`). The endpoint is configurable so the
//! backend also works against storage emulators, which accept no token.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{ObjectStore, StorageError};

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

#[derive(Clone, Debug)]
pub struct GcsBucket {
    client: Client,
    endpoint: Url,
    bucket: String,
    token: Option<String>,
}

impl GcsBucket {
    pub fn new(bucket: impl Into<String>, token: Option<String>) -> Result<Self, StorageError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, bucket, token)
    }

    pub fn with_endpoint(
        endpoint: &str,
        bucket: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StorageError::Rejected(format!("invalid endpoint '{endpoint}': {e}")))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            bucket: bucket.into(),
            token,
        })
    }

    /// `{endpoint}/{segments...}`, each segment percent-encoded on its own so
    /// the slashes inside object names survive.
    fn url(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Rejected(format!("endpoint {} cannot be a base", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        self.url(&["storage", "v1", "b", &self.bucket, "o", key])
    }

    fn upload_url(&self, key: &str) -> Result<Url, StorageError> {
        let mut url = self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Turns a non-success response into [`StorageError::Http`].
async fn check(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Http {
        status: status.as_u16(),
        url,
        body,
    })
}

#[async_trait]
impl ObjectStore for GcsBucket {
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        let url = self.url(&["storage", "v1", "b", &self.bucket])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::BucketNotFound(self.bucket.clone()));
        }
        check(response).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let url = self.object_url(key)?;
        let response = self.authorize(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }

    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.upload_url(key)?;
        debug!(key, size = bytes.len(), "gcs: uploading bytes");
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        check(self.authorize(request).send().await?).await?;
        Ok(())
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let url = self.upload_url(key)?;
        debug!(key, size, path = %path.display(), "gcs: streaming file");

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, size)
            .body(body);
        check(self.authorize(request).send().await?).await?;
        Ok(())
    }

    async fn make_public(&self, key: &str) -> Result<(), StorageError> {
        let url = self.url(&["storage", "v1", "b", &self.bucket, "o", key, "acl"])?;
        let request = self.client.post(url).json(&serde_json::json!({
            "entity": "allUsers",
            "role": "READER",
        }));
        check(self.authorize(request).send().await?).await?;
        Ok(())
    }

    fn uri(&self, key: &str) -> String {
        format!("gs://{}/{}", self.bucket, key)
    }
}
