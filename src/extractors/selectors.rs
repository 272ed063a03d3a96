use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// What to pull from the elements matched by a CSS selector.
///
/// Decoded once from the request: a bare string is shorthand for
/// [`SelectorSpec::Text`]; otherwise an object tagged with `type`
/// (`text`, `attr`, `html`, `array`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawSelectorSpec")]
pub enum SelectorSpec {
    /// Trimmed text of the first match
    Text(String),
    /// Named attribute of the first match
    Attribute { selector: String, attribute: String },
    /// Inner markup of the first match
    InnerHtml(String),
    /// Trimmed text of every match, in document order
    TextArray(String),
}

/// Result key to selector spec
pub type SelectorMap = BTreeMap<String, SelectorSpec>;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelectorSpec {
    Bare(String),
    Tagged(TaggedSelectorSpec),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum TaggedSelectorSpec {
    Text {
        selector: String,
    },
    #[serde(alias = "attribute")]
    Attr {
        selector: String,
        attribute: String,
    },
    #[serde(alias = "innerHtml")]
    Html {
        selector: String,
    },
    #[serde(alias = "textArray")]
    Array {
        selector: String,
    },
}

impl From<RawSelectorSpec> for SelectorSpec {
    fn from(raw: RawSelectorSpec) -> Self {
        match raw {
            RawSelectorSpec::Bare(selector) => SelectorSpec::Text(selector),
            RawSelectorSpec::Tagged(TaggedSelectorSpec::Text { selector }) => {
                SelectorSpec::Text(selector)
            }
            RawSelectorSpec::Tagged(TaggedSelectorSpec::Attr {
                selector,
                attribute,
            }) => SelectorSpec::Attribute {
                selector,
                attribute,
            },
            RawSelectorSpec::Tagged(TaggedSelectorSpec::Html { selector }) => {
                SelectorSpec::InnerHtml(selector)
            }
            RawSelectorSpec::Tagged(TaggedSelectorSpec::Array { selector }) => {
                SelectorSpec::TextArray(selector)
            }
        }
    }
}

impl SelectorSpec {
    pub fn selector(&self) -> &str {
        match self {
            SelectorSpec::Text(selector)
            | SelectorSpec::InnerHtml(selector)
            | SelectorSpec::TextArray(selector) => selector,
            SelectorSpec::Attribute { selector, .. } => selector,
        }
    }
}

/// Evaluate every key of `selectors` against the document.
///
/// A key whose selector fails to parse yields `null`; the remaining keys
/// are still evaluated.
pub fn extract(doc: &Html, selectors: &SelectorMap) -> Map<String, Value> {
    selectors
        .iter()
        .map(|(key, spec)| (key.clone(), evaluate(doc, key, spec)))
        .collect()
}

fn evaluate(doc: &Html, key: &str, spec: &SelectorSpec) -> Value {
    let selector = match Selector::parse(spec.selector()) {
        Ok(selector) => selector,
        Err(e) => {
            ::log::warn!(
                "Invalid selector {:?} for key {}: {:?}",
                spec.selector(),
                key,
                e
            );
            return Value::Null;
        }
    };

    let mut matches = doc.select(&selector);
    match spec {
        SelectorSpec::Text(_) => matches
            .next()
            .map(|el| Value::String(trimmed_text(el)))
            .unwrap_or(Value::Null),
        SelectorSpec::Attribute { attribute, .. } => matches
            .next()
            .and_then(|el| el.value().attr(attribute))
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        SelectorSpec::InnerHtml(_) => matches
            .next()
            .map(|el| Value::String(el.inner_html()))
            .unwrap_or(Value::Null),
        SelectorSpec::TextArray(_) => {
            Value::Array(matches.map(|el| Value::String(trimmed_text(el))).collect())
        }
    }
}

pub(crate) fn trimmed_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
