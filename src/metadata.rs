use crate::document::HtmlParser;
use crate::UnfurlError;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use tracing::debug;

/// A metadata value: one string, or every value of a key that appeared more
/// than once, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Scalar(String),
    List(Vec<String>),
}

impl MetaValue {
    /// Folds another occurrence of the same key into this value.
    pub fn merge(self, value: String) -> Self {
        match self {
            MetaValue::Scalar(first) => MetaValue::List(vec![first, value]),
            MetaValue::List(mut values) => {
                values.push(value);
                MetaValue::List(values)
            }
        }
    }

    pub fn first(&self) -> &str {
        match self {
            MetaValue::Scalar(value) => value,
            MetaValue::List(values) => values.first().map(String::as_str).unwrap_or_default(),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            MetaValue::Scalar(value) => vec![value.as_str()],
            MetaValue::List(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Scalar(value.to_string())
    }
}

/// Raw key/value metadata scraped from a page head.
///
/// Keys are meta `name`s (or `property` when `name` is empty) exactly as
/// found, plus `title` and `canonical`. Iteration is ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawMetadata {
    entries: BTreeMap<String, MetaValue>,
}

impl RawMetadata {
    fn push(&mut self, key: String, value: String) {
        let merged = match self.entries.remove(&key) {
            Some(existing) => existing.merge(value),
            None => MetaValue::Scalar(value),
        };
        self.entries.insert(key, merged);
    }

    fn replace(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), MetaValue::Scalar(value));
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(key)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).map(MetaValue::first)
    }

    /// The first of `keys` holding a non-blank value.
    pub fn first_defined(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.first(key))
            .find(|value| !value.trim().is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MetaValue> {
        self.entries.iter()
    }
}

impl FromIterator<(String, String)> for RawMetadata {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut meta = RawMetadata::default();
        for (key, value) in iter {
            meta.push(key, value);
        }
        meta
    }
}

impl<'a> IntoIterator for &'a RawMetadata {
    type Item = (&'a String, &'a MetaValue);
    type IntoIter = btree_map::Iter<'a, String, MetaValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Metadata extractor, responsible for reading meta tags, the title and the
/// canonical link out of a page head
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor {
    parser: HtmlParser,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parser(parser: HtmlParser) -> Self {
        Self { parser }
    }

    pub fn extract(&self, head: &str) -> Result<RawMetadata, UnfurlError> {
        let document = self.parser.parse(head)?;
        Ok(scan_head(&document))
    }
}

/// Extracts raw metadata from head markup, tolerating malformed HTML.
pub fn extract_metadata(head: &str) -> RawMetadata {
    scan_head(&Html::parse_document(head))
}

fn scan_head(document: &Html) -> RawMetadata {
    let mut meta = RawMetadata::default();

    if let Some(title) = extract_title(document) {
        meta.replace("title", title);
    }

    if let Some(canonical) = extract_canonical(document) {
        meta.replace("canonical", canonical);
    }

    if let Ok(meta_selector) = Selector::parse("meta") {
        for el in document.select(&meta_selector) {
            let attrs = el.value();
            let name = attrs.attr("name").unwrap_or_default();
            let key = if name.is_empty() {
                attrs.attr("property").unwrap_or_default()
            } else {
                name
            };

            if key.is_empty() {
                continue;
            }

            let content = attrs.attr("content").unwrap_or_default();
            meta.push(key.to_string(), content.to_string());
        }
    }

    debug!(keys = meta.len(), "Extracted head metadata");
    meta
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|s| s.trim().to_string())
}

fn extract_canonical(document: &Html) -> Option<String> {
    let link_selector = Selector::parse("link").ok()?;

    document
        .select(&link_selector)
        .filter(|el| el.value().attr("rel") == Some("canonical"))
        .last()
        .map(|el| el.value().attr("href").unwrap_or_default().to_string())
}
