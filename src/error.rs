use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum UnfurlError {
    #[error("Cannot parse empty HTML")]
    EmptyInput,

    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch content: {0}")]
    FetchError(String),

    #[error("Failed to probe image dimensions: {url} - {message}")]
    ProbeFailure { url: String, message: String },

    #[error("Failed to extract metadata: {0}")]
    ExtractError(String),
}

impl UnfurlError {
    /// Short stable name of the variant, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            UnfurlError::EmptyInput => "empty_input",
            UnfurlError::UrlParseError(_) => "url_parse",
            UnfurlError::InvalidUrl(_) => "invalid_url",
            UnfurlError::FetchError(_) => "fetch",
            UnfurlError::ProbeFailure { .. } => "probe",
            UnfurlError::ExtractError(_) => "extract",
        }
    }

    pub fn log(&self) {
        match self {
            UnfurlError::EmptyInput => {
                warn!("Empty HTML received");
            }
            UnfurlError::UrlParseError(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            UnfurlError::InvalidUrl(e) => {
                warn!(error = %e, "URL has no usable scheme or host");
            }
            UnfurlError::FetchError(e) => {
                error!(error = %e, "Content fetch failed");
            }
            UnfurlError::ProbeFailure { url, message } => {
                debug!(url = %url, error = %message, "Image dimension probe failed");
            }
            UnfurlError::ExtractError(e) => {
                error!(error = %e, "Metadata extraction failed");
            }
        }
    }
}
