//! Snap detail page extraction.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::config::ExtractorConfig;
use super::dom::{attr, img_src, text_of, SnapSelectors};
use super::fields::{parse_like_count, product_url_from_image, split_meta, strip_resize, Measurements};
use super::island::island_payload;
use super::state::StatePattern;
use super::{scalar_string, ExtractContext, ExtractionFailure, FailureReason, PageExtractor, Strategy};
use crate::config::ConfigError;
use crate::models::{account_uuid, model_info, Record, SnapKind, SubRecord};

/// Extracts [`Record`]s from snap pages.
#[derive(Debug, Clone)]
pub struct SnapExtractor {
    selectors: SnapSelectors,
    island: Selector,
    scripts: Selector,
    island_path: String,
    state: StatePattern,
    house_account: String,
    snap_base_url: String,
    product_base_url: String,
}

impl SnapExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            selectors: SnapSelectors::compile(&config.selectors)?,
            island: parse_selector("script#__NEXT_DATA__")?,
            scripts: parse_selector("script")?,
            island_path: config.island_path.clone(),
            state: StatePattern::new(&config.snap_state_namespace)?,
            house_account: config.house_account.clone(),
            snap_base_url: config.snap_base_url.clone(),
            product_base_url: config.product_base_url.clone(),
        })
    }

    fn from_payload(&self, value: &Value, item_id: &str) -> Option<SnapDraft> {
        let payload: SnapPayload = serde_json::from_value(value.clone()).ok()?;
        let id = payload.id.as_ref().and_then(scalar_string)?;
        if !item_id.is_empty() && id != item_id {
            debug!("Payload id {} does not match requested {}", id, item_id);
            return None;
        }

        let measurements = payload.model.map(SnapModel::measurements).unwrap_or_default();
        let products = payload
            .goods
            .into_iter()
            .map(|g| g.into_sub_record(&self.product_base_url))
            .collect();

        Some(SnapDraft {
            snap_id: id,
            account_name: payload.user.map(|u| u.nickname).unwrap_or_default(),
            measurements,
            likes: payload.like_count.as_ref().map(like_value).unwrap_or(0),
            desc: payload.content.unwrap_or_default().trim().to_string(),
            images: payload
                .media
                .into_iter()
                .filter_map(|m| m.url)
                .map(|u| strip_resize(&u))
                .collect(),
            products,
            kind: payload.snap_type.as_deref().and_then(SnapKind::from_snap_type),
        })
    }

    fn from_dom(&self, document: &Html, item_id: &str) -> Option<SnapDraft> {
        let sel = &self.selectors;
        let cards = sel.card.all_in(document);
        let card = cards
            .iter()
            .find(|c| attr(**c, "data-key") == Some(item_id))
            .or_else(|| cards.first())
            .copied()
            .unwrap_or_else(|| document.root_element());

        let snap_id = attr(card, "data-key")
            .map(str::to_string)
            .or_else(|| (!item_id.is_empty()).then(|| item_id.to_string()))?;

        let kind = if sel.brand_badge.first(card).is_some() {
            Some(SnapKind::Brand)
        } else {
            None
        };

        Some(SnapDraft {
            snap_id,
            account_name: sel.account.text(card),
            measurements: split_meta(&sel.meta.text(card)),
            likes: parse_like_count(&sel.likes.text(card)),
            desc: sel.description.text(card),
            images: self.dom_images(card),
            products: self.dom_products(card),
            kind,
        })
    }

    fn dom_images(&self, card: ElementRef<'_>) -> Vec<String> {
        let sel = &self.selectors;
        let from_slides: Vec<String> = sel
            .slides
            .all(card)
            .into_iter()
            .filter_map(|slide| slide.select(&sel.img).next())
            .filter_map(img_src)
            .map(strip_resize)
            .collect();
        if !from_slides.is_empty() {
            return from_slides;
        }

        // Cards without slide wrappers: any snap image.
        card.select(&sel.img)
            .filter_map(img_src)
            .filter(|src| src.contains("snap"))
            .map(strip_resize)
            .collect()
    }

    fn dom_products(&self, card: ElementRef<'_>) -> Vec<SubRecord> {
        let sel = &self.selectors;
        let Some(container) = sel.product_container.first(card) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut products = Vec::new();
        for item in sel.product_item.all(container) {
            if let Some(id) = attr(item, "data-item-id") {
                if !seen.insert(id) {
                    continue;
                }
            }

            let product_url = item
                .select(&sel.product_img)
                .next()
                .and_then(|img| attr(img, "data-src").or_else(|| attr(img, "src")))
                .and_then(|src| product_url_from_image(src, &self.product_base_url));

            let brand_name = sel
                .product_brand
                .first(item)
                .map(text_of)
                .or_else(|| attr(item, "data-item-brand").map(str::to_string))
                .unwrap_or_default();

            let name_block = sel
                .product_name
                .first(item)
                .or_else(|| item.select(&sel.div).nth(4));
            let spans: Vec<String> = name_block
                .map(|block| block.select(&sel.span).map(text_of).collect())
                .unwrap_or_default();

            products.push(SubRecord {
                product_url,
                brand_name,
                product_name: spans.first().cloned().unwrap_or_default(),
                desc: spans.get(1).cloned().unwrap_or_default(),
            });
        }
        products
    }

    fn finish(&self, draft: SnapDraft) -> Record {
        let kind = if !self.house_account.is_empty() && draft.account_name == self.house_account {
            SnapKind::Mss
        } else {
            draft.kind.unwrap_or_default()
        };
        let Measurements {
            height,
            weight,
            tone,
        } = draft.measurements;

        Record {
            snap_url: format!("{}{}", self.snap_base_url, draft.snap_id),
            account_uuid: account_uuid(&draft.account_name),
            model_info: model_info(&height, &weight, &tone),
            snap_id: draft.snap_id,
            account_name: draft.account_name,
            height,
            weight,
            tone,
            snap_like: draft.likes,
            snap_desc: draft.desc,
            img_urls: draft.images,
            products: draft.products,
            kind,
        }
    }
}

impl PageExtractor for SnapExtractor {
    type Output = Record;

    fn kind(&self) -> &'static str {
        "snap"
    }

    fn detail_url(&self, item_id: &str) -> String {
        format!("{}{}", self.snap_base_url, item_id)
    }

    fn extract_with_strategy(
        &self,
        html: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<(Record, Strategy), ExtractionFailure> {
        if html.trim().is_empty() {
            return Err(ExtractionFailure::new(FailureReason::EmptyPage, ctx.item_id));
        }
        let document = Html::parse_document(html);

        if let Some(draft) = island_payload(&document, &self.island, &self.island_path)
            .and_then(|v| self.from_payload(&v, ctx.item_id))
        {
            return Ok((self.finish(draft), Strategy::DataIsland));
        }

        if let Some(draft) = self
            .state
            .find_in_document(&document, &self.scripts)
            .and_then(|v| self.from_payload(&v, ctx.item_id))
        {
            return Ok((self.finish(draft), Strategy::InlineState));
        }

        match self.from_dom(&document, ctx.item_id) {
            Some(draft) => Ok((self.finish(draft), Strategy::Dom)),
            None => Err(ExtractionFailure::new(
                FailureReason::MissingIdentifier,
                ctx.item_id,
            )),
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        field: "builtin".to_string(),
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn like_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => parse_like_count(s),
        _ => 0,
    }
}

/// Fields gathered by any strategy before the record is finalized.
struct SnapDraft {
    snap_id: String,
    account_name: String,
    measurements: Measurements,
    likes: u64,
    desc: String,
    images: Vec<String>,
    products: Vec<SubRecord>,
    /// Kind stated by the page, if any.
    kind: Option<SnapKind>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SnapPayload {
    #[serde(alias = "snapId")]
    id: Option<Value>,
    snap_type: Option<String>,
    #[serde(alias = "profile", alias = "account")]
    user: Option<SnapUser>,
    model: Option<SnapModel>,
    #[serde(alias = "likeCnt")]
    like_count: Option<Value>,
    #[serde(alias = "description")]
    content: Option<String>,
    #[serde(alias = "images", alias = "medias")]
    media: Vec<SnapMedia>,
    #[serde(alias = "products")]
    goods: Vec<SnapGoods>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SnapUser {
    #[serde(alias = "name", alias = "nickName")]
    nickname: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SnapModel {
    height: Option<Value>,
    weight: Option<Value>,
    #[serde(alias = "tone")]
    skin_tone: Option<String>,
}

impl SnapModel {
    fn measurements(self) -> Measurements {
        Measurements {
            height: measurement(self.height.as_ref(), "cm"),
            weight: measurement(self.weight.as_ref(), "kg"),
            tone: self.skin_tone.unwrap_or_default().trim().to_string(),
        }
    }
}

/// Numbers get their unit appended; strings are taken as written.
fn measurement(value: Option<&Value>, unit: &str) -> String {
    match value {
        Some(Value::Number(n)) => format!("{}{}", n, unit),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SnapMedia {
    #[serde(alias = "path", alias = "imageUrl")]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SnapGoods {
    #[serde(alias = "goodsId")]
    goods_no: Option<Value>,
    #[serde(alias = "brand")]
    brand_name: String,
    #[serde(alias = "name", alias = "goodsNm")]
    goods_name: String,
    #[serde(alias = "desc")]
    option: String,
    image_url: Option<String>,
}

impl SnapGoods {
    fn into_sub_record(self, product_base_url: &str) -> SubRecord {
        let product_url = self
            .goods_no
            .as_ref()
            .and_then(scalar_string)
            .map(|no| format!("{}{}", product_base_url, no))
            .or_else(|| {
                self.image_url
                    .as_deref()
                    .and_then(|img| product_url_from_image(img, product_base_url))
            });
        SubRecord {
            product_url,
            brand_name: self.brand_name.trim().to_string(),
            product_name: self.goods_name.trim().to_string(),
            desc: self.option.trim().to_string(),
        }
    }
}
