use crate::UnfurlError;
use async_trait::async_trait;
use image::ImageReader;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{debug, instrument};

pub const DEFAULT_MAX_PROBE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Looks up the pixel size of a remote image.
#[async_trait]
pub trait DimensionProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<Dimensions, UnfurlError>;
}

/// Reads an image over HTTP only until its header can be decoded.
#[derive(Clone)]
pub struct HttpDimensionProbe {
    client: Client,
    max_bytes: usize,
}

impl HttpDimensionProbe {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_bytes: DEFAULT_MAX_PROBE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl DimensionProbe for HttpDimensionProbe {
    #[instrument(level = "debug", skip(self))]
    async fn probe(&self, url: &str) -> Result<Dimensions, UnfurlError> {
        let failure = |message: String| UnfurlError::ProbeFailure {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failure(format!("unexpected status {}", response.status())));
        }

        let mut buffer = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| failure(e.to_string()))? {
            buffer.extend_from_slice(&chunk);

            if let Ok(dimensions) = decode_dimensions(&buffer) {
                debug!(
                    width = dimensions.width,
                    height = dimensions.height,
                    bytes_read = buffer.len(),
                    "Decoded image header"
                );
                return Ok(dimensions);
            }

            if buffer.len() >= self.max_bytes {
                return Err(failure(format!(
                    "no image header within {} bytes",
                    self.max_bytes
                )));
            }
        }

        decode_dimensions(&buffer).map_err(|e| failure(e.to_string()))
    }
}

/// Decodes just the header of (possibly truncated) image bytes.
pub fn decode_dimensions(bytes: &[u8]) -> Result<Dimensions, image::ImageError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;

    Ok(Dimensions { width, height })
}
