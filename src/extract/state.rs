//! Inline `<namespace>.state = {...};` script assignments.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::config::ConfigError;

/// Matches one state assignment and decodes the object that follows it.
#[derive(Debug, Clone)]
pub struct StatePattern {
    assignment: Regex,
}

impl StatePattern {
    /// Build a matcher for `<namespace>.state = `.
    pub fn new(namespace: &str) -> Result<Self, ConfigError> {
        let pattern = format!(r"{}\.state\s*=\s*", regex::escape(namespace));
        let assignment = Regex::new(&pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        Ok(Self { assignment })
    }

    /// Search raw text for the assignment and decode its object literal.
    ///
    /// Decoding stops at the end of the first complete JSON value, so the
    /// trailing `;` and any following statements are ignored.
    pub fn find_in_text(&self, text: &str) -> Option<Value> {
        for m in self.assignment.find_iter(text) {
            let rest = &text[m.end()..];
            if !rest.starts_with('{') {
                continue;
            }
            let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
            if let Some(Ok(value @ Value::Object(_))) = stream.next() {
                return Some(value);
            }
        }
        None
    }

    /// Search every `<script>` element of a parsed document.
    pub fn find_in_document(&self, document: &Html, scripts: &Selector) -> Option<Value> {
        document.select(scripts).find_map(|script| {
            let text: String = script.text().collect();
            self.find_in_text(&text)
        })
    }
}
