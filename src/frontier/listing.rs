//! Item id extraction from listing snapshots.

use regex::Regex;
use scraper::Html;

use super::config::FrontierConfig;
use crate::config::ConfigError;
use crate::extract::SelectorChain;
use crate::models::ItemId;

/// Pulls item ids out of listing anchors.
#[derive(Debug, Clone)]
pub struct ListingIds {
    anchors: SelectorChain,
    id_pattern: Regex,
}

impl ListingIds {
    pub fn new(config: &FrontierConfig) -> Result<Self, ConfigError> {
        let id_pattern = Regex::new(&config.id_pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", config.id_pattern, e)))?;
        Ok(Self {
            anchors: SelectorChain::compile("anchor_selectors", &config.anchor_selectors)?,
            id_pattern,
        })
    }

    /// Ids in document order; duplicates are left for the frontier to drop.
    pub fn extract(&self, html: &str) -> Vec<ItemId> {
        let document = Html::parse_document(html);
        self.anchors
            .all_in(&document)
            .into_iter()
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| self.id_from_href(href))
            .collect()
    }

    /// Last path segment of an href, without query or fragment.
    pub fn id_from_href(&self, href: &str) -> Option<ItemId> {
        let path = href.split(['?', '#']).next().unwrap_or_default();
        let segment = path.trim_end_matches('/').rsplit('/').next()?;
        if segment.is_empty() || !self.id_pattern.is_match(segment) {
            return None;
        }
        Some(segment.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> ListingIds {
        ListingIds::new(&FrontierConfig::default()).unwrap()
    }

    #[test]
    fn test_id_from_href() {
        let l = listing();
        assert_eq!(l.id_from_href("/snap/123456").as_deref(), Some("123456"));
        assert_eq!(
            l.id_from_href("https://www.musinsa.com/snap/987?gf=A#top").as_deref(),
            Some("987")
        );
        assert_eq!(l.id_from_href("/snap/555/").as_deref(), Some("555"));
        assert_eq!(l.id_from_href("/snap/main/recommend"), None);
        assert_eq!(l.id_from_href(""), None);
    }

    #[test]
    fn test_extract_prefers_card_links() {
        let html = r#"<html><body>
            <a class="SnapFeedCard__Link-abc" href="/snap/1">one</a>
            <a class="SnapFeedCard__Link-abc" href="/snap/2?x=1">two</a>
            <a class="SnapFeedCard__Link-abc" href="/snap/1">one again</a>
            <a href="/snap/999">sidebar</a>
        </body></html>"#;
        assert_eq!(listing().extract(html), vec!["1", "2", "1"]);
    }

    #[test]
    fn test_extract_falls_back_to_snap_links() {
        let html = r#"<a href="/snap/10">a</a><a href="/snap/main">b</a><a href="/other/11">c</a>"#;
        assert_eq!(listing().extract(html), vec!["10"]);
    }

    #[test]
    fn test_invalid_id_pattern_rejected() {
        let config = FrontierConfig {
            id_pattern: "(".to_string(),
            ..Default::default()
        };
        assert!(matches!(ListingIds::new(&config), Err(ConfigError::InvalidPattern(_))));
    }
}
