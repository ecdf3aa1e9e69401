//! Snap record model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FolderPath, Harvested};

/// Namespace for account UUIDs. Changing it re-groups every stored record.
pub const ACCOUNT_NAMESPACE: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_567812345678);

/// Derive the stable account UUID for a display name.
///
/// Empty names map to the `"unknown"` bucket.
pub fn account_uuid(account_name: &str) -> Uuid {
    let name = if account_name.is_empty() {
        "unknown"
    } else {
        account_name
    };
    Uuid::new_v5(&ACCOUNT_NAMESPACE, name.as_bytes())
}

/// Render the legacy `model_info` string: `"<height>/<weight>"` plus `", <tone>"`.
pub fn model_info(height: &str, weight: &str, tone: &str) -> String {
    if tone.is_empty() {
        format!("{}/{}", height, weight)
    } else {
        format!("{}/{}, {}", height, weight, tone)
    }
}

/// Who published a snap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapKind {
    #[default]
    Member,
    Brand,
    Mss,
}

impl SnapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Brand => "brand",
            Self::Mss => "mss",
        }
    }

    /// Map the `snapType` values found in structured page payloads.
    pub fn from_snap_type(s: &str) -> Option<Self> {
        match s {
            "USER_SNAP" => Some(Self::Member),
            "BRAND_SNAP" => Some(Self::Brand),
            "CODISHOP_SNAP" => Some(Self::Mss),
            _ => None,
        }
    }
}

/// A product tagged on a snap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubRecord {
    /// Canonical product URL, when the tag image carries a product id.
    pub product_url: Option<String>,
    pub brand_name: String,
    pub product_name: String,
    /// Secondary name line (color/option text).
    pub desc: String,
}

/// Structured result for one snap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub snap_id: String,
    pub snap_url: String,
    #[serde(default)]
    pub account_name: String,
    pub account_uuid: Uuid,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub model_info: String,
    #[serde(default)]
    pub snap_like: u64,
    #[serde(default)]
    pub snap_desc: String,
    #[serde(default)]
    pub img_urls: Vec<String>,
    #[serde(default)]
    pub products: Vec<SubRecord>,
    /// Publisher kind; serialized under the legacy first-level folder key.
    #[serde(rename = "folder1", default)]
    pub kind: SnapKind,
}

impl Harvested for Record {
    fn item_id(&self) -> &str {
        &self.snap_id
    }

    fn folder_path(&self) -> FolderPath {
        FolderPath::new(self.kind.as_str(), self.account_uuid.to_string())
    }

    fn media_urls(&self) -> &[String] {
        &self.img_urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_uuid_is_deterministic() {
        let a = account_uuid("stylist_kim");
        let b = account_uuid("stylist_kim");
        assert_eq!(a, b);
        assert_eq!(a.get_version_num(), 5);
        assert_ne!(a, account_uuid("stylist_lee"));
    }

    #[test]
    fn test_account_uuid_known_value() {
        assert_eq!(account_uuid(""), account_uuid("unknown"));
        assert_eq!(
            ACCOUNT_NAMESPACE.to_string(),
            "12345678-1234-5678-1234-567812345678"
        );
    }

    #[test]
    fn test_model_info_format() {
        assert_eq!(model_info("170cm", "65kg", "웜톤"), "170cm/65kg, 웜톤");
        assert_eq!(model_info("170cm", "", ""), "170cm/");
    }

    #[test]
    fn test_folder_path_uses_kind_and_uuid() {
        let uuid = account_uuid("brand_official");
        let record = Record {
            snap_id: "1".to_string(),
            snap_url: "https://example.com/snap/1".to_string(),
            account_name: "brand_official".to_string(),
            account_uuid: uuid,
            height: String::new(),
            weight: String::new(),
            tone: String::new(),
            model_info: "/".to_string(),
            snap_like: 0,
            snap_desc: String::new(),
            img_urls: Vec::new(),
            products: Vec::new(),
            kind: SnapKind::Brand,
        };
        assert_eq!(
            record.folder_path(),
            FolderPath::new("brand", uuid.to_string())
        );
    }

    #[test]
    fn test_kind_serializes_as_folder1() {
        let json = serde_json::to_value(SnapKind::Mss).unwrap();
        assert_eq!(json, serde_json::json!("mss"));
        assert_eq!(SnapKind::from_snap_type("BRAND_SNAP"), Some(SnapKind::Brand));
        assert_eq!(SnapKind::from_snap_type("OTHER"), None);
    }
}
