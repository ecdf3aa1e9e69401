//! Google Cloud Storage backend over the JSON API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use tracing::debug;

use super::{ObjectStore, StorageError, StorageResult};

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const BOUNDARY: &str = "snapharvest-object-boundary";

/// Bucket-scoped GCS client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct GcsStore {
    client: Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl GcsStore {
    pub fn new(bucket: impl Into<String>, token: Option<String>) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StorageError::Http(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            bucket: bucket.into(),
            token,
        })
    }

    /// Point at a different API host (emulators, tests).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(path)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> StorageResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, path, body))
    }

    /// `multipart/related` body: JSON metadata part then the object bytes.
    fn multipart_body(
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> Vec<u8> {
        let mut metadata = json!({ "name": path, "contentType": content_type });
        if let Some(cache) = cache_control {
            metadata["cacheControl"] = json!(cache);
        }

        let mut body = Vec::with_capacity(bytes.len() + 512);
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {ct}\r\n\r\n",
                b = BOUNDARY,
                m = metadata,
                ct = content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=multipart",
            self.endpoint,
            urlencoding::encode(&self.bucket)
        );
        let size = bytes.len();
        let body = Self::multipart_body(path, bytes, content_type, cache_control);
        let request = self
            .client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", BOUNDARY),
            )
            .body(body);
        self.send(path, request).await?;
        debug!("Uploaded gs://{}/{} ({} bytes)", self.bucket, path, size);
        Ok(())
    }
}

/// Map a failed response onto the storage error taxonomy.
fn classify(status: StatusCode, path: &str, body: String) -> StorageError {
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(path.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            StorageError::Unavailable(format!("{} for {}", status, path))
        }
        s if s.is_server_error() => StorageError::Unavailable(format!("{} for {}", status, path)),
        _ => StorageError::Rejected {
            path: path.to_string(),
            message: format!("{}: {}", status, body.trim()),
        },
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.upload(path, bytes, content_type, None).await
    }

    async fn put_cached(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> StorageResult<()> {
        self.upload(path, bytes, content_type, Some(cache_control))
            .await
    }

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        let request = self
            .client
            .get(self.object_url(path))
            .query(&[("alt", "media")]);
        let response = self.send(path, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn copy(&self, src: &str, dst: &str) -> StorageResult<()> {
        let url = format!(
            "{}/copyTo/b/{}/o/{}",
            self.object_url(src),
            urlencoding::encode(&self.bucket),
            urlencoding::encode(dst)
        );
        self.send(src, self.client.post(url)).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("gs://{}", self.bucket)
    }
}
