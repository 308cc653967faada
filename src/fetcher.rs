use crate::UnfurlError;
use reqwest::{header::HeaderMap, Client};
use std::time::Duration;
use tracing::{debug, error, instrument};

pub const DEFAULT_USER_AGENT: &str = "spider";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Page fetcher, a thin wrapper over a pooled `reqwest::Client`
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        debug!("Fetcher initialized with default configuration");
        Self::new_with_config(FetcherConfig::default())
    }

    /// Creates a Fetcher with custom configuration
    ///
    /// # Panics
    /// If the HTTP client cannot be built; see [`Fetcher::try_new_with_config`].
    pub fn new_with_config(config: FetcherConfig) -> Self {
        Self::try_new_with_config(config).unwrap_or_else(|e| {
            panic!("Failed to initialize HTTP client: {}", e);
        })
    }

    pub fn try_new_with_config(config: FetcherConfig) -> Result<Self, UnfurlError> {
        let mut client_builder = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .pool_max_idle_per_host(10);

        if let Some(headers) = config.headers {
            client_builder = client_builder.default_headers(headers);
        }

        if let Some(redirect_policy) = config.redirect_policy {
            client_builder = client_builder.redirect(redirect_policy);
        }

        let client = client_builder.build().map_err(|e| {
            error!(error = %e, "Failed to create HTTP client");
            UnfurlError::FetchError(format!("cannot build HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client, shared with the image dimension probe.
    pub fn client(&self) -> &Client {
        &self.client
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn fetch(&self, url: &str) -> Result<String, UnfurlError> {
        debug!(url = %url, "Starting fetch request");

        let response = self.client.get(url).send().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to send request");
            UnfurlError::FetchError(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, url = %url, "Request returned non-success status");
            return Err(UnfurlError::FetchError(format!(
                "{} returned status {}",
                url, status
            )));
        }

        let content = response.text().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to read response body");
            UnfurlError::FetchError(e.to_string())
        })?;

        debug!(url = %url, content_length = content.len(), "Successfully fetched webpage");
        Ok(content)
    }
}

/// Transport settings for page fetches and image probes.
///
/// # Examples
/// ```ignore
/// let fetcher = Fetcher::new_with_config(FetcherConfig {
///     user_agent: "my-custom-agent/1.0".to_string(),
///     timeout: Duration::from_secs(20),
///     headers: Some(my_custom_headers),
///     redirect_policy: Some(reqwest::redirect::Policy::limited(3)),
/// });
/// ```
#[derive(Debug)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub headers: Option<HeaderMap>,
    pub redirect_policy: Option<reqwest::redirect::Policy>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            headers: None,
            redirect_policy: None,
        }
    }
}
