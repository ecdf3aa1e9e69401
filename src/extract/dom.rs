//! CSS selector heuristics for DOM scraping.
//!
//! Every lookup returns an `Option` or an empty collection; nothing here
//! fails on a malformed page.

use scraper::{ElementRef, Html, Selector};

use super::config::SnapSelectorConfig;
use crate::config::ConfigError;

/// Ordered selectors for one field: the first selector that matches wins.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    selectors: Vec<Selector>,
}

impl SelectorChain {
    /// Compile a chain, naming the field in the error.
    pub fn compile(field: &str, sources: &[String]) -> Result<Self, ConfigError> {
        let selectors = sources
            .iter()
            .map(|s| {
                Selector::parse(s).map_err(|e| ConfigError::InvalidSelector {
                    field: field.to_string(),
                    selector: s.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }

    /// First descendant of `scope` matched by the earliest matching selector.
    pub fn first<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.selectors
            .iter()
            .find_map(|sel| scope.select(sel).next())
    }

    /// All matches of the earliest selector that matches anything.
    pub fn all<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        for sel in &self.selectors {
            let found: Vec<_> = scope.select(sel).collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Like [`all`](Self::all), against a whole document.
    pub fn all_in<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        self.all(document.root_element())
    }

    /// Trimmed text of the first match, empty when nothing matches.
    pub fn text(&self, scope: ElementRef<'_>) -> String {
        self.first(scope).map(text_of).unwrap_or_default()
    }
}

/// Compiled form of [`SnapSelectorConfig`].
#[derive(Debug, Clone)]
pub struct SnapSelectors {
    pub card: SelectorChain,
    pub brand_badge: SelectorChain,
    pub account: SelectorChain,
    pub meta: SelectorChain,
    pub likes: SelectorChain,
    pub description: SelectorChain,
    pub slides: SelectorChain,
    pub product_container: SelectorChain,
    pub product_item: SelectorChain,
    pub product_brand: SelectorChain,
    pub product_name: SelectorChain,
    pub img: Selector,
    pub product_img: Selector,
    pub div: Selector,
    pub span: Selector,
}

impl SnapSelectors {
    pub fn compile(config: &SnapSelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            card: SelectorChain::compile("card", &config.card)?,
            brand_badge: SelectorChain::compile("brand_badge", &config.brand_badge)?,
            account: SelectorChain::compile("account", &config.account)?,
            meta: SelectorChain::compile("meta", &config.meta)?,
            likes: SelectorChain::compile("likes", &config.likes)?,
            description: SelectorChain::compile("description", &config.description)?,
            slides: SelectorChain::compile("slides", &config.slides)?,
            product_container: SelectorChain::compile(
                "product_container",
                &config.product_container,
            )?,
            product_item: SelectorChain::compile("product_item", &config.product_item)?,
            product_brand: SelectorChain::compile("product_brand", &config.product_brand)?,
            product_name: SelectorChain::compile("product_name", &config.product_name)?,
            img: fixed("img")?,
            product_img: fixed("img[data-src], img[src]")?,
            div: fixed("div")?,
            span: fixed("span")?,
        })
    }
}

fn fixed(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        field: "builtin".to_string(),
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Element text with each text node trimmed and blank nodes dropped.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Attribute value, treating empty strings as absent.
pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Image URL of an `<img>`: `src` first, then the lazy-load `data-src`.
pub fn img_src<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    attr(img, "src").or_else(|| attr(img, "data-src"))
}
