//! Per-field parsing helpers shared by the extraction strategies.
//!
//! Every helper is total: malformed input resolves to an empty or zero
//! value instead of an error.

use url::Url;

/// Model measurements parsed from a `"<height>/<weight> · <tone>"` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Measurements {
    pub height: String,
    pub weight: String,
    pub tone: String,
}

/// Split the composite model meta text.
///
/// The text before the first middot holds `height/weight`; without a `/`
/// it is classified by unit (`cm` height, `kg` weight). The last
/// middot-separated part is the tone.
pub fn split_meta(text: &str) -> Measurements {
    let mut out = Measurements::default();
    let text = text.trim();
    if text.is_empty() {
        return out;
    }

    let parts: Vec<&str> = text.split('·').map(str::trim).collect();
    let hw = parts.first().copied().unwrap_or_default();

    if let Some((height, weight)) = hw.split_once('/') {
        out.height = height.trim().to_string();
        // Anything after a second slash is not part of the weight.
        out.weight = weight.split('/').next().unwrap_or_default().trim().to_string();
    } else if hw.contains("cm") {
        out.height = hw.to_string();
    } else if hw.contains("kg") {
        out.weight = hw.to_string();
    }

    if parts.len() > 1 {
        if let Some(tone) = parts.last() {
            out.tone = tone.to_string();
        }
    }

    out
}

/// Parse a like counter such as `"1,234"` or `"좋아요 12"`.
///
/// Non-digits are dropped; empty or overflowing input yields 0.
pub fn parse_like_count(text: &str) -> u64 {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Remove the `w=<digits>` resize parameter from an image URL.
pub fn strip_resize(src: &str) -> String {
    let src = src.trim();
    match Url::parse(src) {
        Ok(mut url) => {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, v)| !is_resize_param(k, v))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if kept.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(kept);
            }
            url.to_string()
        }
        // Protocol-relative or otherwise unparseable: strip textually.
        Err(_) => strip_resize_text(src),
    }
}

fn is_resize_param(key: &str, value: &str) -> bool {
    key == "w" && !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn strip_resize_text(src: &str) -> String {
    let Some(pos) = src.find("?w=") else {
        return src.to_string();
    };
    let rest = &src[pos + 3..];
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return src.to_string();
    }
    let tail = &rest[digits..];
    match tail.strip_prefix('&') {
        Some(more) => format!("{}?{}", &src[..pos], more),
        None => format!("{}{}", &src[..pos], tail),
    }
}

/// Recover a product id from a product image URL.
///
/// Product images live under `/goods_img/<yyyymmdd>/<product id>/`, where
/// the date segment is 8 digits and the id 6 to 8 digits.
pub fn product_id_from_image(img_url: &str) -> Option<&str> {
    let mut rest = img_url;
    while let Some(pos) = rest.find("/goods_img/") {
        rest = &rest[pos + "/goods_img/".len()..];
        let mut segments = rest.splitn(3, '/');
        let date = segments.next().unwrap_or_default();
        let id = segments.next().unwrap_or_default();
        // A trailing slash must follow the id segment.
        if segments.next().is_none() {
            continue;
        }
        if all_digits(date) && date.len() == 8 && all_digits(id) && (6..=8).contains(&id.len()) {
            return Some(id);
        }
    }
    None
}

/// Build the canonical product URL for a tagged product image.
pub fn product_url_from_image(img_url: &str, product_base_url: &str) -> Option<String> {
    product_id_from_image(img_url).map(|id| format!("{}{}", product_base_url, id))
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Resolve an image URL against the CDN base.
///
/// Protocol-relative URLs get `https:`; absolute URLs are kept.
pub fn normalize_image_url(src: &str, base: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        return Some(src.to_string());
    }
    Url::parse(base)
        .and_then(|b| b.join(src))
        .map(|u| u.to_string())
        .ok()
}
