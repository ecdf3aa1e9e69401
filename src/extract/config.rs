//! Extractor configuration types.

use serde::{Deserialize, Serialize};

/// Extractor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Dot path to the record payload inside the `__NEXT_DATA__` island.
    #[serde(default = "default_island_path")]
    pub island_path: String,

    /// Namespace of the inline `<namespace>.state = {...};` assignment on snap pages.
    #[serde(default = "default_snap_state_namespace")]
    pub snap_state_namespace: String,

    /// Namespace of the inline state assignment on product pages.
    #[serde(default = "default_product_state_namespace")]
    pub product_state_namespace: String,

    /// Account name that marks a snap as published by the shop itself.
    #[serde(default = "default_house_account")]
    pub house_account: String,

    /// Canonical snap URL prefix; the item id is appended.
    #[serde(default = "default_snap_base_url")]
    pub snap_base_url: String,

    /// Canonical product URL prefix; the product id is appended.
    #[serde(default = "default_product_base_url")]
    pub product_base_url: String,

    /// Base for resolving relative product image URLs.
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,

    /// DOM selectors for snap cards.
    #[serde(default)]
    pub selectors: SnapSelectorConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            island_path: default_island_path(),
            snap_state_namespace: default_snap_state_namespace(),
            product_state_namespace: default_product_state_namespace(),
            house_account: default_house_account(),
            snap_base_url: default_snap_base_url(),
            product_base_url: default_product_base_url(),
            image_base_url: default_image_base_url(),
            selectors: SnapSelectorConfig::default(),
        }
    }
}

fn default_island_path() -> String {
    "props.pageProps.meta.data".to_string()
}

fn default_snap_state_namespace() -> String {
    "window.__MSS__.snap".to_string()
}

fn default_product_state_namespace() -> String {
    "window.__MSS__.product".to_string()
}

fn default_house_account() -> String {
    "무신사 코디".to_string()
}

fn default_snap_base_url() -> String {
    "https://www.musinsa.com/snap/".to_string()
}

fn default_product_base_url() -> String {
    "https://www.musinsa.com/products/".to_string()
}

fn default_image_base_url() -> String {
    "https://image.msscdn.net/".to_string()
}

/// CSS selectors for DOM scraping, tried in order per field.
///
/// Class names on the site are generated, so selectors match on class
/// substrings (`[class*='...']`) and every field carries a fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapSelectorConfig {
    /// Card container; carries the item id in `data-key`.
    pub card: Vec<String>,
    /// Present only on brand-published cards.
    pub brand_badge: Vec<String>,
    pub account: Vec<String>,
    /// `"<height>/<weight> · <tone>"` text.
    pub meta: Vec<String>,
    pub likes: Vec<String>,
    pub description: Vec<String>,
    /// Image slide wrappers.
    pub slides: Vec<String>,
    /// Wrapper holding tagged products.
    pub product_container: Vec<String>,
    /// One tagged product; carries `data-item-id` and `data-item-brand`.
    pub product_item: Vec<String>,
    pub product_brand: Vec<String>,
    /// Block whose spans hold the product name and option text.
    pub product_name: Vec<String>,
}

impl Default for SnapSelectorConfig {
    fn default() -> Self {
        fn list(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            card: list(&["div[class*='sc-7659943b-0']", "div[data-key]"]),
            brand_badge: list(&["div[class*='sc-552dd808-0']"]),
            account: list(&[
                "div[class*='sc-faa3da62-0']",
                "a[href*='profile'], div[class*='nickname']",
            ]),
            meta: list(&[
                "span[class*='sc-7659943b-1']",
                "div[class*='model'] span, span[class*='model']",
            ]),
            likes: list(&["span[class*='sc-7659943b-3']", "span[class*='like']"]),
            description: list(&[
                "div[class*='sc-7659943b-5']",
                "div[class*='desc'], p[class*='desc']",
            ]),
            slides: list(&["div[class*='sc-8c7680f3-1']", "div[class*='slide']"]),
            product_container: list(&["div[class*='sc-316ed15c-1']", "div[class*='goods']"]),
            product_item: list(&["div[data-item-brand]"]),
            product_brand: list(&["span.text-etc_11px_semibold", "span[class*='brand']"]),
            product_name: list(&["div[class*='sc-1a38c32-7']", "div[class*='name']"]),
        }
    }
}
