//! Product catalog record model.

use serde::{Deserialize, Serialize};

use super::{FolderPath, Harvested};

/// Top-level category names mapped to storage folder names.
pub const CATEGORY_FOLDERS: &[(&str, &str)] = &[
    ("상의", "top"),
    ("바지", "pants"),
    ("아우터", "outer"),
    ("원피스/스커트", "onepiece"),
    ("키즈", "kids"),
    ("스포츠/레저", "sports"),
];

const MALE: &str = "남성";
const FEMALE: &str = "여성";

/// Structured result for one product detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(default)]
    pub style_no: String,
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_name_korean: String,
    #[serde(default)]
    pub genders: Vec<String>,
    #[serde(default)]
    pub brand_name: String,
    #[serde(default)]
    pub brand_name_korean: String,
    #[serde(default)]
    pub category_depth1: String,
    #[serde(default)]
    pub category_depth2: String,
    #[serde(default)]
    pub price_krw: i64,
    /// Material rows: the material name followed by its selected values.
    #[serde(default)]
    pub extra_infos: Vec<Vec<String>>,
    #[serde(default = "unknown_count")]
    pub review_count: i64,
    #[serde(default = "unknown_score")]
    pub review_score: f64,
    pub product_url: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

fn unknown_count() -> i64 {
    -1
}

fn unknown_score() -> f64 {
    -1.0
}

impl ProductRecord {
    /// Gender bucket: `uni` when sold to both, `men` for men only, else `women`.
    pub fn gender_bucket(&self) -> &'static str {
        let male = self.genders.iter().any(|g| g == MALE);
        let female = self.genders.iter().any(|g| g == FEMALE);
        match (male, female) {
            (true, true) => "uni",
            (true, false) => "men",
            _ => "women",
        }
    }

    /// Category folder for `category_depth1`, `etc` when unmapped.
    pub fn category_folder(&self) -> &'static str {
        CATEGORY_FOLDERS
            .iter()
            .find(|(name, _)| *name == self.category_depth1)
            .map(|(_, folder)| *folder)
            .unwrap_or("etc")
    }
}

impl Harvested for ProductRecord {
    fn item_id(&self) -> &str {
        &self.product_id
    }

    fn folder_path(&self) -> FolderPath {
        let group: String = self.product_id.chars().take(3).collect();
        FolderPath::new(
            format!("{}_{}", self.gender_bucket(), self.category_folder()),
            group,
        )
    }

    fn media_urls(&self) -> &[String] {
        &self.image_urls
    }
}
