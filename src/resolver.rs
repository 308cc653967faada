use crate::document::{BodyScan, HtmlParser, ImageTag};
use crate::probe::{DimensionProbe, Dimensions};
use crate::utils::{self, SiteBase};
use crate::{PageSummary, RawMetadata, UnfurlError};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const DEFAULT_IMAGE_THRESHOLD: u32 = 128;

const TITLE_KEYS: &[&str] = &["title", "og:title", "twitter:title"];
const DESCRIPTION_KEYS: &[&str] = &["description", "og:description", "twitter:description"];
const IMAGE_KEYS: &[&str] = &["og:image", "twitter:image"];
const URL_KEYS: &[&str] = &["canonical", "og:url"];

#[derive(Debug)]
struct ImageCandidate {
    url: String,
    dimensions: Dimensions,
}

/// Turns raw head metadata plus the page body into a [`PageSummary`],
/// falling back to body heuristics for whatever the metadata lacks.
#[derive(Clone)]
pub struct ContentResolver {
    probe: Arc<dyn DimensionProbe>,
    parser: HtmlParser,
    threshold: u32,
}

impl ContentResolver {
    pub fn new(probe: Arc<dyn DimensionProbe>) -> Self {
        Self {
            probe,
            parser: HtmlParser::default(),
            threshold: DEFAULT_IMAGE_THRESHOLD,
        }
    }

    pub fn with_parser(mut self, parser: HtmlParser) -> Self {
        self.parser = parser;
        self
    }

    /// Minimum width and height, in pixels, of a body image worth showing.
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    #[instrument(level = "debug", skip(self, meta, body))]
    pub async fn resolve_summary(
        &self,
        meta: RawMetadata,
        body: &str,
        source_url: &str,
    ) -> PageSummary {
        let mut title = meta.first_defined(TITLE_KEYS).map(str::to_string);
        let mut description = meta.first_defined(DESCRIPTION_KEYS).map(str::to_string);
        let mut images: Vec<String> = meta
            .first_defined(IMAGE_KEYS)
            .and_then(|image| absolute_meta_image(image, source_url))
            .map(|image| vec![image])
            .unwrap_or_default();
        let url = meta
            .first_defined(URL_KEYS)
            .unwrap_or(source_url)
            .to_string();

        if title.is_none() || description.is_none() || images.is_empty() {
            debug!(
                has_title = title.is_some(),
                has_description = description.is_some(),
                has_image = !images.is_empty(),
                "Falling back to body content"
            );

            let scan = self.scan_body(body);

            if title.is_none() {
                title = scan.heading;
            }

            if description.is_none() {
                description = scan.paragraph;
            }

            if images.is_empty() {
                images = self
                    .rank_images(&scan.images, source_url)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "Skipping image fallback");
                        Vec::new()
                    });
            }
        }

        PageSummary {
            title,
            description,
            images,
            url,
            meta,
        }
    }

    // The DOM is dropped before any probe is awaited.
    fn scan_body(&self, body: &str) -> BodyScan {
        if body.trim().is_empty() {
            return BodyScan::default();
        }

        match self.parser.parse_body(body) {
            Ok(document) => BodyScan::from_document(&document),
            Err(e) => {
                e.log();
                BodyScan::default()
            }
        }
    }

    /// Picks the largest body image at least `threshold` pixels on each side.
    ///
    /// Images without a declared `width` are probed one at a time, in
    /// document order. Returns at most one URL.
    pub async fn rank_images(
        &self,
        images: &[ImageTag],
        source_url: &str,
    ) -> Result<Vec<String>, UnfurlError> {
        let base = utils::pickup_site_base(source_url)?;

        let mut candidates = Vec::new();
        for tag in images {
            if let Some(candidate) = self.inspect_image(tag, &base).await {
                candidates.push(candidate);
            }
        }

        debug!(candidates = candidates.len(), "Ranked body images");
        Ok(select_largest(candidates))
    }

    async fn inspect_image(&self, tag: &ImageTag, base: &SiteBase) -> Option<ImageCandidate> {
        if is_ignored_source(&tag.src) {
            debug!(src = %tag.src, "Ignoring gif or favicon");
            return None;
        }

        let url = utils::resolve_image_src(&tag.src, base);
        if !utils::is_valid_absolute_url(&url) {
            debug!(src = %tag.src, "Ignoring image without a valid absolute URL");
            return None;
        }

        let dimensions = if tag.width.is_empty() {
            match self.probe.probe(&url).await {
                Ok(dimensions) => dimensions,
                Err(e) => {
                    e.log();
                    return None;
                }
            }
        } else {
            declared_dimensions(tag)?
        };

        if dimensions.width < self.threshold || dimensions.height < self.threshold {
            debug!(
                url = %url,
                width = dimensions.width,
                height = dimensions.height,
                "Image below size threshold"
            );
            return None;
        }

        Some(ImageCandidate { url, dimensions })
    }
}

/// Resolves an `og:image`/`twitter:image` value against the page origin.
/// Anything still not absolute afterwards is dropped.
fn absolute_meta_image(image: &str, source_url: &str) -> Option<String> {
    let image = image.trim();
    let resolved = match utils::pickup_site_base(source_url) {
        Ok(base) => utils::resolve_image_src(image, &base),
        Err(_) => image.to_string(),
    };

    if utils::is_valid_absolute_url(&resolved) {
        Some(resolved)
    } else {
        debug!(image = %image, "Ignoring metadata image without a valid absolute URL");
        None
    }
}

fn is_ignored_source(src: &str) -> bool {
    src.to_ascii_lowercase().ends_with(".gif") || src == "/favicon.ico"
}

fn declared_dimensions(tag: &ImageTag) -> Option<Dimensions> {
    let parse = |value: &str| value.trim().trim_end_matches("px").parse::<u32>().ok();
    Some(Dimensions::new(parse(&tag.width)?, parse(&tag.height)?))
}

fn select_largest(mut candidates: Vec<ImageCandidate>) -> Vec<String> {
    // stable, so equal areas keep document order
    candidates.sort_by(|a, b| b.dimensions.area().cmp(&a.dimensions.area()));
    candidates
        .into_iter()
        .next()
        .map(|candidate| vec![candidate.url])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract_metadata;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubProbe {
        sizes: HashMap<String, Dimensions>,
        calls: Mutex<Vec<String>>,
    }

    impl StubProbe {
        fn with(sizes: &[(&str, u32, u32)]) -> Arc<Self> {
            Arc::new(Self {
                sizes: sizes
                    .iter()
                    .map(|(url, w, h)| (url.to_string(), Dimensions::new(*w, *h)))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DimensionProbe for StubProbe {
        async fn probe(&self, url: &str) -> Result<Dimensions, UnfurlError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.sizes
                .get(url)
                .copied()
                .ok_or_else(|| UnfurlError::ProbeFailure {
                    url: url.to_string(),
                    message: "connection refused".into(),
                })
        }
    }

    fn meta(pairs: &[(&str, &str)]) -> RawMetadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn tag(src: &str, width: &str, height: &str) -> ImageTag {
        ImageTag {
            src: src.into(),
            width: width.into(),
            height: height.into(),
        }
    }

    #[tokio::test]
    async fn test_og_image_skips_body_images() {
        let probe = StubProbe::with(&[]);
        let resolver = ContentResolver::new(probe.clone());

        let summary = resolver
            .resolve_summary(
                meta(&[("og:image", "http://x.com/a.jpg")]),
                r#"<body><img src="/big.png"></body>"#,
                "http://x.com/page",
            )
            .await;

        assert_eq!(summary.images, vec!["http://x.com/a.jpg"]);
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_twitter_image_used_when_no_og_image() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));
        let summary = resolver
            .resolve_summary(
                meta(&[("twitter:image", "https://cdn.x.com/card.png")]),
                "",
                "https://x.com/",
            )
            .await;

        assert_eq!(summary.images, vec!["https://cdn.x.com/card.png"]);
    }

    #[tokio::test]
    async fn test_relative_metadata_images_are_resolved() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));

        let summary = resolver
            .resolve_summary(
                extract_metadata(r#"<meta property="og:image" content="/img/card.png">"#),
                "",
                "https://example.com/p",
            )
            .await;
        assert_eq!(summary.images, vec!["https://example.com/img/card.png"]);

        let summary = resolver
            .resolve_summary(
                meta(&[("twitter:image", "//cdn.x/a.png")]),
                "",
                "https://example.com/p",
            )
            .await;
        assert_eq!(summary.images, vec!["https://cdn.x/a.png"]);
    }

    #[tokio::test]
    async fn test_unresolvable_metadata_image_falls_back_to_body() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));

        let summary = resolver
            .resolve_summary(
                meta(&[("og:image", "img/card.png")]),
                r#"<body><img src="/hero.jpg" width="800" height="400"></body>"#,
                "https://example.com/blog/",
            )
            .await;
        assert_eq!(summary.images, vec!["https://example.com/hero.jpg"]);

        // no base to resolve against, and the value is not absolute
        let summary = resolver
            .resolve_summary(meta(&[("og:image", "/img/card.png")]), "", "not-a-url")
            .await;
        assert!(summary.images.is_empty());
        assert!(summary.meta.contains_key("og:image"));
    }

    #[tokio::test]
    async fn test_url_falls_back_to_source() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));
        let summary = resolver
            .resolve_summary(RawMetadata::default(), "", "http://example.com/p")
            .await;

        assert_eq!(summary.url, "http://example.com/p");
        assert_eq!(summary.title, None);
        assert_eq!(summary.description, None);
        assert!(summary.images.is_empty());
    }

    #[tokio::test]
    async fn test_canonical_preferred_over_og_url() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));

        let summary = resolver
            .resolve_summary(
                meta(&[
                    ("og:url", "https://example.com/og"),
                    ("canonical", "https://example.com/canonical"),
                ]),
                "",
                "https://example.com/p?utm=1",
            )
            .await;
        assert_eq!(summary.url, "https://example.com/canonical");

        let summary = resolver
            .resolve_summary(
                meta(&[("og:url", "https://example.com/og")]),
                "",
                "https://example.com/p?utm=1",
            )
            .await;
        assert_eq!(summary.url, "https://example.com/og");
    }

    #[tokio::test]
    async fn test_body_fallbacks_fill_only_missing_fields() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));
        let body = r#"<body>
            <h1>Heading title</h1>
            <p>  Opening paragraph.  </p>
            <img src="/hero.jpg" width="800" height="400">
        </body>"#;

        let summary = resolver
            .resolve_summary(
                meta(&[("title", "Head title")]),
                body,
                "https://example.com/post",
            )
            .await;

        assert_eq!(summary.title.as_deref(), Some("Head title"));
        assert_eq!(summary.description.as_deref(), Some("Opening paragraph."));
        assert_eq!(summary.images, vec!["https://example.com/hero.jpg"]);
        // passthrough keeps the raw keys
        assert_eq!(summary.meta.first("title"), Some("Head title"));
    }

    #[tokio::test]
    async fn test_blank_metadata_counts_as_missing() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));
        let summary = resolver
            .resolve_summary(
                meta(&[("title", "   "), ("og:title", "OG title"), ("description", "")]),
                "<body><p>Body text</p></body>",
                "https://example.com/",
            )
            .await;

        assert_eq!(summary.title.as_deref(), Some("OG title"));
        assert_eq!(summary.description.as_deref(), Some("Body text"));
    }

    #[tokio::test]
    async fn test_strict_parser_still_fills_from_body() {
        let resolver =
            ContentResolver::new(StubProbe::with(&[])).with_parser(HtmlParser::strict());
        let summary = resolver
            .resolve_summary(
                meta(&[("title", "T")]),
                "\n<body><h1>H</h1><p>Para</p></body></html>",
                "https://example.com/",
            )
            .await;

        assert_eq!(summary.title.as_deref(), Some("T"));
        assert_eq!(summary.description.as_deref(), Some("Para"));

        let summary = resolver
            .resolve_summary(
                RawMetadata::default(),
                "<body><h1>H</h1><p><b>unclosed",
                "https://example.com/",
            )
            .await;
        assert_eq!(summary.title, None);
        assert_eq!(summary.description, None);
    }

    #[tokio::test]
    async fn test_invalid_source_url_only_skips_images() {
        let probe = StubProbe::with(&[]);
        let resolver = ContentResolver::new(probe.clone());
        let summary = resolver
            .resolve_summary(
                RawMetadata::default(),
                r#"<body><h1>Still here</h1><img src="/a.png"></body>"#,
                "not-a-url",
            )
            .await;

        assert_eq!(summary.title.as_deref(), Some("Still here"));
        assert!(summary.images.is_empty());
        assert_eq!(summary.url, "not-a-url");
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rank_threshold_rejects_short_side() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));
        let ranked = resolver
            .rank_images(
                &[
                    tag("/wide.png", "300", "100"),
                    tag("/square.png", "200", "200"),
                ],
                "http://example.com/p",
            )
            .await
            .unwrap();

        // 100px is under the threshold, so only the square survives
        assert_eq!(ranked, vec!["http://example.com/square.png"]);
    }

    #[tokio::test]
    async fn test_rank_prefers_larger_area() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));
        let ranked = resolver
            .rank_images(
                &[
                    tag("/square.png", "200", "200"),
                    tag("/wide.png", "300", "150"),
                ],
                "http://example.com/p",
            )
            .await
            .unwrap();

        assert_eq!(ranked, vec!["http://example.com/wide.png"]);
    }

    #[tokio::test]
    async fn test_rank_square_beats_wide_when_both_qualify() {
        let resolver = ContentResolver::new(StubProbe::with(&[])).with_threshold(100);
        let ranked = resolver
            .rank_images(
                &[
                    tag("/wide.png", "300", "100"),
                    tag("/square.png", "200", "200"),
                ],
                "http://example.com/p",
            )
            .await
            .unwrap();

        assert_eq!(ranked, vec!["http://example.com/square.png"]);
    }

    #[tokio::test]
    async fn test_rank_single_small_image_is_empty() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));
        let ranked = resolver
            .rank_images(&[tag("/tall.png", "50", "500")], "http://example.com/")
            .await
            .unwrap();

        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn test_rank_ties_keep_document_order() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));
        let ranked = resolver
            .rank_images(
                &[
                    tag("/first.png", "200", "300"),
                    tag("/second.png", "300", "200"),
                ],
                "http://example.com/",
            )
            .await
            .unwrap();

        assert_eq!(ranked, vec!["http://example.com/first.png"]);
    }

    #[tokio::test]
    async fn test_rank_skips_gifs_favicons_and_relative_paths() {
        let probe = StubProbe::with(&[]);
        let resolver = ContentResolver::new(probe.clone());
        let ranked = resolver
            .rank_images(
                &[
                    tag("/anim.GIF", "500", "500"),
                    tag("/favicon.ico", "500", "500"),
                    tag("images/relative.png", "500", "500"),
                    tag("", "", ""),
                ],
                "http://example.com/blog/",
            )
            .await
            .unwrap();

        assert!(ranked.is_empty());
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rank_probes_undeclared_images_in_order() {
        let probe = StubProbe::with(&[
            ("https://cdn.example.com/a.png", 400, 300),
            ("https://example.com/c.png", 640, 480),
        ]);
        let resolver = ContentResolver::new(probe.clone());
        let ranked = resolver
            .rank_images(
                &[
                    tag("//cdn.example.com/a.png", "", ""),
                    tag("/b.png", "", ""),
                    tag("/c.png", "", "999"),
                    tag("/d.png", "150", "150"),
                ],
                "https://example.com/article",
            )
            .await
            .unwrap();

        assert_eq!(ranked, vec!["https://example.com/c.png"]);
        // b fails to probe and is skipped, d declares its width
        assert_eq!(
            probe.calls(),
            vec![
                "https://cdn.example.com/a.png",
                "https://example.com/b.png",
                "https://example.com/c.png",
            ]
        );
    }

    #[tokio::test]
    async fn test_rank_skips_unreadable_declared_sizes() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));
        let ranked = resolver
            .rank_images(
                &[tag("/a.png", "auto", "300"), tag("/b.png", "300px", "")],
                "https://example.com/",
            )
            .await
            .unwrap();

        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn test_rank_invalid_source_url() {
        let resolver = ContentResolver::new(StubProbe::with(&[]));
        let result = resolver
            .rank_images(&[tag("/a.png", "300", "300")], "/relative/only")
            .await;

        assert!(matches!(result, Err(UnfurlError::InvalidUrl(_))));
    }
}
