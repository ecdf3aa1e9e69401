//! Product detail page extraction.

use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;

use super::config::ExtractorConfig;
use super::dom::attr;
use super::fields::normalize_image_url;
use super::island::island_payload;
use super::state::StatePattern;
use super::{scalar_string, ExtractContext, ExtractionFailure, FailureReason, PageExtractor, Strategy};
use crate::config::ConfigError;
use crate::models::ProductRecord;

/// Extracts [`ProductRecord`]s from product pages.
///
/// Product pages always carry structured data; there is no DOM fallback.
#[derive(Debug, Clone)]
pub struct ProductExtractor {
    island: Selector,
    scripts: Selector,
    thumbnail: Selector,
    island_path: String,
    state: StatePattern,
    product_base_url: String,
    image_base_url: String,
}

impl ProductExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        let parse = |s: &str| {
            Selector::parse(s).map_err(|e| ConfigError::InvalidSelector {
                field: "builtin".to_string(),
                selector: s.to_string(),
                message: e.to_string(),
            })
        };
        Ok(Self {
            island: parse("script#__NEXT_DATA__")?,
            scripts: parse("script")?,
            thumbnail: parse("meta[property='og:image']")?,
            island_path: config.island_path.clone(),
            state: StatePattern::new(&config.product_state_namespace)?,
            product_base_url: config.product_base_url.clone(),
            image_base_url: config.image_base_url.clone(),
        })
    }

    fn build(&self, value: Value, document: &Html, ctx: &ExtractContext<'_>) -> Option<ProductRecord> {
        let payload: ProductPayload = serde_json::from_value(value).ok()?;

        let product_id = payload
            .goods_no
            .as_ref()
            .and_then(scalar_string)
            .or_else(|| (!ctx.item_id.is_empty()).then(|| ctx.item_id.to_string()))?;

        let mut image_urls: Vec<String> = document
            .select(&self.thumbnail)
            .next()
            .and_then(|meta| attr(meta, "content"))
            .and_then(|src| normalize_image_url(src, &self.image_base_url))
            .into_iter()
            .collect();
        image_urls.extend(
            payload
                .goods_images
                .iter()
                .filter_map(|img| img.image_url.as_deref())
                .filter_map(|src| normalize_image_url(src, &self.image_base_url)),
        );

        let product_url = if ctx.source_url.is_empty() {
            format!("{}{}", self.product_base_url, product_id)
        } else {
            ctx.source_url.to_string()
        };

        Some(ProductRecord {
            style_no: payload.style_no.as_ref().and_then(scalar_string).unwrap_or_default(),
            product_id,
            product_name: payload.goods_nm_eng,
            product_name_korean: payload.goods_nm,
            genders: payload.sex,
            brand_name: payload.brand_info.brand,
            brand_name_korean: payload.brand_info.brand_name,
            category_depth1: payload.category.category_depth1_name,
            category_depth2: payload.category.category_depth2_name,
            price_krw: payload.goods_price.sale_price,
            extra_infos: material_rows(&payload.goods_material.materials),
            review_count: payload.goods_review.total_count,
            review_score: payload.goods_review.satisfaction_score,
            product_url,
            image_urls,
        })
    }
}

impl PageExtractor for ProductExtractor {
    type Output = ProductRecord;

    fn kind(&self) -> &'static str {
        "product"
    }

    fn detail_url(&self, item_id: &str) -> String {
        format!("{}{}", self.product_base_url, item_id)
    }

    fn extract_with_strategy(
        &self,
        html: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<(ProductRecord, Strategy), ExtractionFailure> {
        if html.trim().is_empty() {
            return Err(ExtractionFailure::new(FailureReason::EmptyPage, ctx.item_id));
        }
        let document = Html::parse_document(html);

        if let Some(record) = island_payload(&document, &self.island, &self.island_path)
            .and_then(|v| self.build(v, &document, ctx))
        {
            return Ok((record, Strategy::DataIsland));
        }

        if let Some(record) = self
            .state
            .find_in_document(&document, &self.scripts)
            .and_then(|v| self.build(v, &document, ctx))
        {
            return Ok((record, Strategy::InlineState));
        }

        Err(ExtractionFailure::new(
            FailureReason::NoStrategyMatched,
            ctx.item_id,
        ))
    }
}

/// One row per material: its name followed by the selected values.
///
/// Pages without materials send `{}` instead of a list.
fn material_rows(materials: &Value) -> Vec<Vec<String>> {
    let Value::Array(materials) = materials else {
        return Vec::new();
    };
    materials
        .iter()
        .filter_map(|m| {
            let name = m.get("name")?.as_str()?.to_string();
            let mut row = vec![name];
            if let Some(Value::Array(items)) = m.get("items") {
                row.extend(
                    items
                        .iter()
                        .filter(|i| i.get("isSelected").and_then(Value::as_bool).unwrap_or(false))
                        .filter_map(|i| i.get("name").and_then(Value::as_str))
                        .map(str::to_string),
                );
            }
            Some(row)
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProductPayload {
    style_no: Option<Value>,
    goods_no: Option<Value>,
    goods_nm: String,
    goods_nm_eng: String,
    sex: Vec<String>,
    brand_info: BrandInfo,
    category: Category,
    goods_price: GoodsPrice,
    goods_review: GoodsReview,
    goods_material: GoodsMaterial,
    goods_images: Vec<GoodsImage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BrandInfo {
    brand_name: String,
    brand: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Category {
    category_depth1_name: String,
    category_depth2_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GoodsPrice {
    sale_price: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GoodsReview {
    total_count: i64,
    satisfaction_score: f64,
}

impl Default for GoodsReview {
    fn default() -> Self {
        Self {
            total_count: -1,
            satisfaction_score: -1.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoodsMaterial {
    materials: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GoodsImage {
    image_url: Option<String>,
}
