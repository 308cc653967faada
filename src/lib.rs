use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod document;
mod error;
mod fetcher;
#[cfg(feature = "logging")]
mod logging;
mod metadata;
mod probe;
mod resolver;
mod unfurler;
mod utils;

pub use document::{split_document, BodyScan, HtmlParser, ImageTag};
pub use error::UnfurlError;
pub use fetcher::{Fetcher, FetcherConfig, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
#[cfg(feature = "logging")]
pub use logging::{log_failure, log_summary_card, setup_logging, LogConfig};
pub use metadata::{extract_metadata, MetaValue, MetadataExtractor, RawMetadata};
pub use probe::{
    decode_dimensions, DimensionProbe, Dimensions, HttpDimensionProbe, DEFAULT_MAX_PROBE_BYTES,
};
pub use resolver::{ContentResolver, DEFAULT_IMAGE_THRESHOLD};
pub use unfurler::{UnfurlConfig, Unfurler};

/// The normalized summary of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absolute image URLs; at most one today.
    pub images: Vec<String>,
    /// Canonical URL when the page declares one, otherwise the requested URL.
    pub url: String,
    /// Every raw head key, including the `og:*` and `twitter:*` fields.
    pub meta: RawMetadata,
}

impl PageSummary {
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.meta.get(key)
    }

    pub fn site_name(&self) -> Option<&str> {
        self.meta.first_defined(&["og:site_name"])
    }

    /// The Open Graph object type (`og:type`), e.g. `article` or `website`.
    pub fn kind(&self) -> Option<&str> {
        self.meta.first_defined(&["og:type"])
    }

    pub fn keywords(&self) -> Vec<&str> {
        self.meta
            .first("keywords")
            .map(|keywords| {
                keywords
                    .split(',')
                    .map(str::trim)
                    .filter(|keyword| !keyword.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait SummaryGenerator {
    async fn generate_summary(&self, url: &str) -> Result<PageSummary, UnfurlError>;
}
