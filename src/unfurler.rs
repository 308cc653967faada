use crate::document::{split_document, HtmlParser};
use crate::probe::{DimensionProbe, HttpDimensionProbe, DEFAULT_MAX_PROBE_BYTES};
use crate::resolver::DEFAULT_IMAGE_THRESHOLD;
use crate::{
    ContentResolver, Fetcher, FetcherConfig, MetadataExtractor, PageSummary, SummaryGenerator,
    UnfurlError,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug)]
pub struct UnfurlConfig {
    pub fetcher: FetcherConfig,
    /// Minimum width and height of a body image fallback.
    pub image_threshold: u32,
    /// Bytes read from an image before its dimension probe gives up.
    pub max_probe_bytes: usize,
    /// Ignore HTML parse errors instead of failing.
    pub tolerant_html: bool,
}

impl Default for UnfurlConfig {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            image_threshold: DEFAULT_IMAGE_THRESHOLD,
            max_probe_bytes: DEFAULT_MAX_PROBE_BYTES,
            tolerant_html: true,
        }
    }
}

/// Fetches pages and turns them into [`PageSummary`] values.
///
/// Holds no per-call state; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct Unfurler {
    fetcher: Fetcher,
    extractor: MetadataExtractor,
    resolver: ContentResolver,
}

impl Default for Unfurler {
    fn default() -> Self {
        Self::new()
    }
}

impl Unfurler {
    pub fn new() -> Self {
        Self::with_config(UnfurlConfig::default())
    }

    /// # Panics
    /// If the HTTP client cannot be built; see [`Unfurler::try_with_config`].
    pub fn with_config(config: UnfurlConfig) -> Self {
        Self::try_with_config(config).unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn try_with_config(config: UnfurlConfig) -> Result<Self, UnfurlError> {
        let max_probe_bytes = config.max_probe_bytes;
        let fetcher = Fetcher::try_new_with_config(config.fetcher)?;
        let probe =
            HttpDimensionProbe::new(fetcher.client().clone()).with_max_bytes(max_probe_bytes);

        Ok(Self::assemble(
            fetcher,
            Arc::new(probe),
            config.image_threshold,
            config.tolerant_html,
        ))
    }

    /// Uses `probe` for image dimensions instead of the HTTP probe.
    pub fn with_probe(config: UnfurlConfig, probe: Arc<dyn DimensionProbe>) -> Self {
        Self::try_with_probe(config, probe).unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn try_with_probe(
        config: UnfurlConfig,
        probe: Arc<dyn DimensionProbe>,
    ) -> Result<Self, UnfurlError> {
        Ok(Self::assemble(
            Fetcher::try_new_with_config(config.fetcher)?,
            probe,
            config.image_threshold,
            config.tolerant_html,
        ))
    }

    fn assemble(
        fetcher: Fetcher,
        probe: Arc<dyn DimensionProbe>,
        image_threshold: u32,
        tolerant_html: bool,
    ) -> Self {
        let parser = if tolerant_html {
            HtmlParser::tolerant()
        } else {
            HtmlParser::strict()
        };

        Self {
            fetcher,
            extractor: MetadataExtractor::with_parser(parser),
            resolver: ContentResolver::new(probe)
                .with_parser(parser)
                .with_threshold(image_threshold),
        }
    }

    /// Summarizes already-fetched HTML served from `url`.
    #[instrument(level = "debug", skip(self, html), fields(html_len = html.len()))]
    pub async fn parse(&self, url: &str, html: &str) -> Result<PageSummary, UnfurlError> {
        if html.trim().is_empty() {
            return Err(UnfurlError::EmptyInput);
        }

        let (head, body) = split_document(html);
        let meta = self.extractor.extract(head)?;
        debug!(keys = meta.len(), body_len = body.len(), "Resolving summary");

        Ok(self.resolver.resolve_summary(meta, body, url).await)
    }

    /// Fetches `url` and summarizes the returned page.
    pub async fn get(&self, url: &str) -> Result<PageSummary, UnfurlError> {
        let _ = Url::parse(url)?;
        let html = self.fetcher.fetch(url).await?;
        self.parse(url, &html).await
    }
}

#[async_trait]
impl SummaryGenerator for Unfurler {
    async fn generate_summary(&self, url: &str) -> Result<PageSummary, UnfurlError> {
        self.get(url).await
    }
}
