//! Upload gateway: record JSON and media objects with deterministic paths.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{FolderPath, Harvested};
use crate::render::resolve_user_agent;
use crate::storage::{ObjectStore, StorageError};

/// Cache policy written on every media object.
pub const MEDIA_CACHE_CONTROL: &str = "public, max-age=31536000";

const RECORD_ROOT: &str = "json";
const MEDIA_ROOT: &str = "images";
const EXTENSION_ALLOW_LIST: &[&str] = &["jpg", "jpeg", "png", "webp"];
const DEFAULT_EXTENSION: &str = "jpg";

/// Errors fetching or storing a single media object.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Downloaded media bytes plus the declared content type, if any.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Source of media bytes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<MediaPayload, MediaError>;
}

/// Media source backed by a plain HTTP client.
#[derive(Clone)]
pub struct HttpMediaSource {
    client: Client,
}

impl HttpMediaSource {
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self, MediaError> {
        let client = Client::builder()
            .user_agent(resolve_user_agent(user_agent))
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| MediaError::Fetch {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn fetch(&self, url: &str) -> Result<MediaPayload, MediaError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = response.bytes().await.map_err(|e| MediaError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(MediaPayload {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// Map an image MIME type to a file extension.
pub fn mime_to_extension(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/avif" => Some("avif"),
        _ => None,
    }
}

fn extension_to_mime(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "avif" => "image/avif",
        _ => "image/jpeg",
    }
}

/// Extension from the URL path when it is one of the allowed image types.
fn url_extension(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    EXTENSION_ALLOW_LIST
        .contains(&ext.as_str())
        .then_some(ext)
}

/// Resolve the stored extension: URL first, then content type, then `jpg`.
pub fn resolve_extension(url: &str, content_type: Option<&str>) -> String {
    url_extension(url)
        .or_else(|| content_type.and_then(mime_to_extension).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// `json/<kind>/<group>/<id>.json`
pub fn record_path(folder: &FolderPath, item_id: &str) -> String {
    format!("{}/{}.json", folder.under(RECORD_ROOT), item_id)
}

/// `images/<kind>/<group>/<id>/<index>` without the extension.
pub fn media_stem(folder: &FolderPath, item_id: &str, index: usize) -> String {
    format!("{}/{}/{}", folder.under(MEDIA_ROOT), item_id, index)
}

/// Writes records and their media to object storage.
#[derive(Clone)]
pub struct UploadGateway {
    store: Arc<dyn ObjectStore>,
    media: Arc<dyn MediaSource>,
    concurrency: usize,
}

impl UploadGateway {
    pub fn new(store: Arc<dyn ObjectStore>, media: Arc<dyn MediaSource>, concurrency: usize) -> Self {
        Self {
            store,
            media,
            concurrency: concurrency.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Upload the record body, returning its object path.
    pub async fn put_record<T: Harvested>(&self, record: &T) -> Result<String, StorageError> {
        let path = record_path(&record.folder_path(), record.item_id());
        let body = serde_json::to_vec_pretty(record).map_err(|e| StorageError::Rejected {
            path: path.clone(),
            message: e.to_string(),
        })?;
        self.store
            .put(&path, body, "application/json; charset=utf-8")
            .await?;
        debug!("Stored record {}", path);
        Ok(path)
    }

    /// Fetch one media URL and store it at its positional path.
    pub async fn put_media(
        &self,
        url: &str,
        folder: &FolderPath,
        item_id: &str,
        index: usize,
    ) -> Result<String, MediaError> {
        let payload = self.media.fetch(url).await?;
        let ext = resolve_extension(url, payload.content_type.as_deref());
        let path = format!("{}.{}", media_stem(folder, item_id, index), ext);
        let content_type = payload
            .content_type
            .as_deref()
            .filter(|ct| mime_to_extension(ct).is_some())
            .unwrap_or_else(|| extension_to_mime(&ext))
            .to_string();
        self.store
            .put_cached(&path, payload.bytes, &content_type, MEDIA_CACHE_CONTROL)
            .await?;
        Ok(path)
    }

    /// Upload every media URL of a record with bounded concurrency.
    ///
    /// The result is positional: entry `i` is the stored path of media `i + 1`,
    /// or `None` when that image could not be fetched or was refused. A storage
    /// outage fails the whole record.
    pub async fn put_media_all<T: Harvested>(
        &self,
        record: &T,
    ) -> Result<Vec<Option<String>>, StorageError> {
        let folder = record.folder_path();
        let item_id = record.item_id();
        let folder = &folder;

        let results: Vec<Result<String, MediaError>> =
            stream::iter(record.media_urls().iter().enumerate())
                .map(|(i, url)| self.put_media(url, folder, item_id, i + 1))
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut paths = Vec::with_capacity(results.len());
        for (i, result) in results.into_iter().enumerate() {
            match result {
                Ok(path) => paths.push(Some(path)),
                Err(MediaError::Storage(e)) if e.is_outage() => return Err(e),
                Err(e) => {
                    warn!(
                        "Media upload failed for {} -> {}: {}",
                        record.media_urls()[i],
                        media_stem(folder, item_id, i + 1),
                        e
                    );
                    paths.push(None);
                }
            }
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductRecord, StoredRecord};
    use crate::storage::MemoryStore;
    use std::collections::HashMap;

    struct StubMedia {
        responses: HashMap<String, Option<&'static str>>,
    }

    #[async_trait]
    impl MediaSource for StubMedia {
        async fn fetch(&self, url: &str) -> Result<MediaPayload, MediaError> {
            match self.responses.get(url) {
                Some(ct) => Ok(MediaPayload {
                    bytes: url.as_bytes().to_vec(),
                    content_type: ct.map(str::to_string),
                }),
                None => Err(MediaError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn product(images: &[&str]) -> ProductRecord {
        serde_json::from_value(serde_json::json!({
            "product_id": "3412345",
            "product_url": "https://www.musinsa.com/products/3412345",
            "genders": ["남성"],
            "category_depth1": "상의",
            "image_urls": images,
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_extension() {
        assert_eq!(resolve_extension("https://cdn.example/a.webp?w=500", None), "webp");
        assert_eq!(
            resolve_extension("https://cdn.example/img/123", Some("image/png")),
            "png"
        );
        assert_eq!(resolve_extension("https://cdn.example/img/123", None), "jpg");
        assert_eq!(resolve_extension("https://cdn.example/a.JPEG", None), "jpeg");
        assert_eq!(
            resolve_extension("https://cdn.example/a.php", Some("text/html")),
            "jpg"
        );
    }

    #[test]
    fn test_paths() {
        let folder = FolderPath::new("member", "u1");
        assert_eq!(record_path(&folder, "99"), "json/member/u1/99.json");
        assert_eq!(media_stem(&folder, "99", 2), "images/member/u1/99/2");
    }

    #[tokio::test]
    async fn test_put_media_all_keeps_positions() {
        let store = MemoryStore::new();
        let media = StubMedia {
            responses: HashMap::from([
                ("https://cdn.example/a.webp?w=500".to_string(), None),
                ("https://cdn.example/c".to_string(), Some("image/png")),
            ]),
        };
        let gateway = UploadGateway::new(Arc::new(store.clone()), Arc::new(media), 4);
        let record = product(&[
            "https://cdn.example/a.webp?w=500",
            "https://cdn.example/missing.jpg",
            "https://cdn.example/c",
        ]);

        let paths = gateway.put_media_all(&record).await.unwrap();
        assert_eq!(
            paths,
            vec![
                Some("images/men_top/341/3412345/1.webp".to_string()),
                None,
                Some("images/men_top/341/3412345/3.png".to_string()),
            ]
        );

        let first = store.object("images/men_top/341/3412345/1.webp").unwrap();
        assert_eq!(first.content_type, "image/webp");
        assert_eq!(first.cache_control.as_deref(), Some(MEDIA_CACHE_CONTROL));
    }

    #[tokio::test]
    async fn test_put_media_all_fails_on_storage_outage() {
        let store = MemoryStore::new();
        store.fail_prefix("images/");
        let media = StubMedia {
            responses: HashMap::from([("https://cdn.example/c".to_string(), Some("image/png"))]),
        };
        let gateway = UploadGateway::new(Arc::new(store.clone()), Arc::new(media), 4);
        let record = product(&["https://cdn.example/missing.jpg", "https://cdn.example/c"]);

        let err = gateway.put_media_all(&record).await.unwrap_err();
        assert!(err.is_outage());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_put_record_writes_json() {
        let store = MemoryStore::new();
        let media = StubMedia {
            responses: HashMap::new(),
        };
        let gateway = UploadGateway::new(Arc::new(store.clone()), Arc::new(media), 1);
        let record = product(&[]);

        let path = gateway.put_record(&record).await.unwrap();
        assert_eq!(path, "json/men_top/341/3412345.json");

        let stored: ProductRecord =
            serde_json::from_slice(&store.object(&path).unwrap().bytes).unwrap();
        assert_eq!(stored, record);
        let _envelope = StoredRecord {
            record: stored,
            json_path: path,
            img_paths: Vec::new(),
        };
    }

    #[tokio::test]
    async fn test_http_media_source() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![1u8, 2, 3]),
            )
            .mount(&server)
            .await;

        let source = HttpMediaSource::new(Duration::from_secs(5), None).unwrap();
        let payload = source.fetch(&format!("{}/img/1", server.uri())).await.unwrap();
        assert_eq!(payload.bytes, vec![1, 2, 3]);
        assert_eq!(payload.content_type.as_deref(), Some("image/png"));

        let err = source
            .fetch(&format!("{}/img/404", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Status { status: 404, .. }));
    }
}
