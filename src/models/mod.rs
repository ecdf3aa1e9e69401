//! Data models for snapharvest.

mod folder;
mod product;
mod record;
mod work_item;

pub use folder::FolderPath;
pub use product::{ProductRecord, CATEGORY_FOLDERS};
pub use record::{account_uuid, model_info, Record, SnapKind, SubRecord, ACCOUNT_NAMESPACE};
pub use work_item::{WorkItem, WorkStatus};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Opaque item identifier taken from a listing URL path segment.
pub type ItemId = String;

/// A record type that can flow through the batch pipeline.
pub trait Harvested: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Unique identifier of the item this record describes.
    fn item_id(&self) -> &str;

    /// Storage classification derived from the record's own fields.
    fn folder_path(&self) -> FolderPath;

    /// Media URLs in the order they appear on the page.
    fn media_urls(&self) -> &[String];
}

/// Accumulator entry: a record plus the object paths written for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord<T> {
    #[serde(flatten)]
    pub record: T,
    /// Object path of the uploaded record JSON.
    pub json_path: String,
    /// Object paths of media that uploaded successfully, in positional order.
    #[serde(default)]
    pub img_paths: Vec<String>,
}

impl<T: Harvested> StoredRecord<T> {
    pub fn item_id(&self) -> &str {
        self.record.item_id()
    }
}
