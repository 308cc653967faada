use crate::UnfurlError;
use scraper::{Html, Selector};
use tracing::trace;

const HEAD_CLOSE: &str = "</head>";
// What the body segment follows in any page that reaches it.
const BODY_PRELUDE: &str = "<!DOCTYPE html><html><head></head>";

/// Splits raw HTML at the first literal `</head>`.
///
/// The head keeps the marker. Without a marker the whole input is the head
/// and the body is empty.
pub fn split_document(html: &str) -> (&str, &str) {
    match html.find(HEAD_CLOSE) {
        Some(pos) => html.split_at(pos + HEAD_CLOSE.len()),
        None => (html, ""),
    }
}

/// Thin wrapper over the HTML parser deciding what to do with parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlParser {
    tolerant: bool,
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::tolerant()
    }
}

impl HtmlParser {
    /// Parse errors are logged and the recovered tree is used.
    pub fn tolerant() -> Self {
        Self { tolerant: true }
    }

    /// Any parse error fails the parse.
    pub fn strict() -> Self {
        Self { tolerant: false }
    }

    pub fn is_tolerant(&self) -> bool {
        self.tolerant
    }

    pub fn parse(&self, markup: &str) -> Result<Html, UnfurlError> {
        let document = Html::parse_document(markup);

        match document.errors.first() {
            None => Ok(document),
            Some(_) if self.tolerant => {
                trace!(errors = document.errors.len(), "Ignoring HTML parse errors");
                Ok(document)
            }
            Some(first) => Err(UnfurlError::ExtractError(format!(
                "{} HTML parse error(s), first: {}",
                document.errors.len(),
                first
            ))),
        }
    }

    /// Parses the segment left after [`split_document`].
    ///
    /// Strict mode checks it behind an empty doctype'd head, so only errors
    /// in the body markup itself count.
    pub fn parse_body(&self, body: &str) -> Result<Html, UnfurlError> {
        if self.tolerant {
            self.parse(body)
        } else {
            self.parse(&format!("{BODY_PRELUDE}{body}"))
        }
    }
}

/// An `img` element's raw attributes; missing attributes are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageTag {
    pub src: String,
    pub width: String,
    pub height: String,
}

/// Everything the body fallbacks need, read out of the DOM in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyScan {
    pub heading: Option<String>,
    pub paragraph: Option<String>,
    pub images: Vec<ImageTag>,
}

impl BodyScan {
    pub fn from_document(document: &Html) -> Self {
        Self {
            heading: first_text(document, "h1"),
            paragraph: first_text(document, "p"),
            images: image_tags(document),
        }
    }
}

fn first_text(document: &Html, tag: &str) -> Option<String> {
    let selector = Selector::parse(tag).ok()?;

    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn image_tags(document: &Html) -> Vec<ImageTag> {
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|el| {
            let attr = |name: &str| el.value().attr(name).unwrap_or_default().to_string();
            ImageTag {
                src: attr("src"),
                width: attr("width"),
                height: attr("height"),
            }
        })
        .collect()
}
