//! HTTP transport for section requests.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use url::Url;

use crate::config::NetworkConfig;
use crate::errors::HydrationError;

/// Raw response from the section rendering endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl SectionResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for fetching rendered sections.
///
/// Implementations report any received response, whatever its status;
/// the hydrator decides what counts as failure.
#[async_trait]
pub trait SectionTransport: Send + Sync + std::fmt::Debug {
    /// Issues a GET for `url` and returns status and body.
    ///
    /// # Errors
    /// - `HydrationError::NetworkError` - Connection failed or body could not be read
    async fn get(&self, url: &Url) -> Result<SectionResponse, HydrationError>;
}

/// Production transport on a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with default network settings.
    ///
    /// # Errors
    /// - `HydrationError::Configuration` - The HTTP client could not be built
    pub fn new() -> Result<Self, HydrationError> {
        Self::with_config(&NetworkConfig::default())
    }

    /// Creates a transport from explicit network settings.
    ///
    /// # Errors
    /// - `HydrationError::Configuration` - The HTTP client could not be built
    pub fn with_config(config: &NetworkConfig) -> Result<Self, HydrationError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| HydrationError::Configuration {
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one shared with the rest of the host.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SectionTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<SectionResponse, HydrationError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/html")
            .send()
            .await
            .map_err(|e| HydrationError::NetworkError {
                status: None,
                reason: format!("Section request failed: {e}"),
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| HydrationError::NetworkError {
                status: Some(status),
                reason: format!("Failed to read section body: {e}"),
            })?;

        tracing::debug!(%url, status, bytes = body.len(), "Section response received");

        Ok(SectionResponse { status, body })
    }
}
