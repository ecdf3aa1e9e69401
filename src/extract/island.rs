//! Embedded `__NEXT_DATA__` data island.

use scraper::{Html, Selector};
use serde_json::Value;

/// Locate and decode the page-load JSON island, returning the value at `path`.
///
/// Returns `None` when the island is absent, undecodable, or the path
/// resolves to null.
pub fn island_payload(document: &Html, selector: &Selector, path: &str) -> Option<Value> {
    let script = document.select(selector).next()?;
    let raw: String = script.text().collect();
    let data: Value = serde_json::from_str(raw.trim()).ok()?;
    match extract_path(&data, path) {
        Value::Null => None,
        value => Some(value.clone()),
    }
}

/// Walk a dot-separated path through nested objects and arrays.
///
/// Numeric segments index into arrays; anything unresolvable is `Null`.
pub fn extract_path<'a>(data: &'a Value, path: &str) -> &'a Value {
    if path.is_empty() {
        return data;
    }

    let mut current = data;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key).unwrap_or(&Value::Null),
            Value::Array(arr) => match key.parse::<usize>() {
                Ok(idx) => arr.get(idx).unwrap_or(&Value::Null),
                Err(_) => &Value::Null,
            },
            _ => &Value::Null,
        };
    }

    current
}
