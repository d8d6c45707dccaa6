//! Client construction: credentials, endpoint selection and the shared HTTP
//! connection pool.

use std::time::Duration;

use crate::credits::CreditsService;
use crate::error::{Error, Result};
use crate::stt::SttService;
use crate::tts::TtsService;
use crate::voices::VoicesService;

/// Environment variable consulted when no API key is given explicitly.
const API_KEY_ENV: &str = "GRADIUM_API_KEY";

/// Default timeout applied to REST requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// API region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// European region (default).
    #[default]
    Eu,
    /// United States region.
    Us,
}

impl Region {
    /// REST base URL for the region.
    pub fn api_url(&self) -> &'static str {
        match self {
            Region::Eu => "https://eu.api.gradium.ai/api",
            Region::Us => "https://us.api.gradium.ai/api",
        }
    }

    /// WebSocket base URL for the region.
    pub fn ws_url(&self) -> &'static str {
        match self {
            Region::Eu => "wss://eu.api.gradium.ai/api/speech",
            Region::Us => "wss://us.api.gradium.ai/api/speech",
        }
    }
}

/// Builder for [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    api_key: Option<String>,
    region: Region,
    base_url: Option<String>,
    timeout: Option<Duration>,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Set the API key. Without this, the `GRADIUM_API_KEY` environment
    /// variable is consulted at build time.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Select the API region.
    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Use a custom base URL instead of a regional one. The WebSocket URL is
    /// derived from it by scheme substitution plus the `/speech` suffix.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Timeout for REST requests (default 30 s). Streaming sessions are not
    /// subject to this timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Supply a preconfigured HTTP client, replacing the default pool.
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Build the client.
    ///
    /// Fails with [`Error::Authentication`] when no API key is available.
    pub fn build(self) -> Result<Client> {
        let api_key = match self.api_key {
            Some(key) if !key.is_empty() => key,
            _ => std::env::var(API_KEY_ENV).unwrap_or_default(),
        };
        if api_key.is_empty() {
            return Err(Error::Authentication(format!(
                "API key is required. Use ClientBuilder::api_key or set the {API_KEY_ENV} environment variable."
            )));
        }

        let (base_url, ws_url) = match self.base_url {
            Some(base_url) => {
                let base_url = base_url.trim_end_matches('/').to_string();
                let ws_url = derive_ws_url(&base_url);
                (base_url, ws_url)
            }
            None => (
                self.region.api_url().to_string(),
                self.region.ws_url().to_string(),
            ),
        };

        let http = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
                .build()
                .map_err(|e| Error::Connection(format!("failed to build HTTP client: {e}")))?,
        };

        Ok(Client {
            api_key,
            base_url,
            ws_url,
            http,
        })
    }
}

/// WebSocket URL for a custom base URL: scheme swapped to ws(s), `/speech`
/// appended.
fn derive_ws_url(base_url: &str) -> String {
    let swapped = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    };
    format!("{swapped}/speech")
}

/// The Gradium API client.
///
/// Cheap to share by reference; all services borrow from it. REST resources
/// go through a pooled HTTP client, streaming sessions open one WebSocket
/// connection each.
///
/// # Example
///
/// ```rust,ignore
/// let client = Client::builder().api_key("gr-...").build()?;
/// let voices = client.voices().list(None).await?;
/// ```
#[derive(Debug)]
pub struct Client {
    api_key: String,
    base_url: String,
    ws_url: String,
    http: reqwest::Client,
}

impl Client {
    /// Start building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The API key in use.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The REST base URL in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The WebSocket base URL in use.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Text-to-speech operations.
    pub fn tts(&self) -> TtsService<'_> {
        TtsService::new(self)
    }

    /// Speech-to-text operations.
    pub fn stt(&self) -> SttService<'_> {
        SttService::new(self)
    }

    /// Voice profile management.
    pub fn voices(&self) -> VoicesService<'_> {
        VoicesService::new(self)
    }

    /// Credit balance lookup.
    pub fn credits(&self) -> CreditsService<'_> {
        CreditsService::new(self)
    }

    /// Authenticated request builder for a REST path.
    pub(crate) fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_eu() {
        let client = Client::builder().api_key("test-key").build().unwrap();
        assert_eq!(client.api_key(), "test-key");
        assert_eq!(client.base_url(), "https://eu.api.gradium.ai/api");
        assert_eq!(client.ws_url(), "wss://eu.api.gradium.ai/api/speech");
    }

    #[test]
    fn test_builder_us_region() {
        let client = Client::builder()
            .api_key("test-key")
            .region(Region::Us)
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "https://us.api.gradium.ai/api");
        assert_eq!(client.ws_url(), "wss://us.api.gradium.ai/api/speech");
    }

    #[test]
    fn test_builder_custom_base_url_https() {
        let client = Client::builder()
            .api_key("test-key")
            .base_url("https://example.com/api/")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "https://example.com/api");
        assert_eq!(client.ws_url(), "wss://example.com/api/speech");
    }

    #[test]
    fn test_builder_custom_base_url_http() {
        let client = Client::builder()
            .api_key("test-key")
            .base_url("http://localhost:8080")
            .build()
            .unwrap();
        assert_eq!(client.ws_url(), "ws://localhost:8080/speech");
    }

    #[test]
    fn test_builder_missing_api_key() {
        // Only meaningful when the fallback env var is absent.
        if std::env::var(API_KEY_ENV).is_ok() {
            return;
        }
        let err = Client::builder().build().unwrap_err();
        match err {
            crate::error::Error::Authentication(msg) => {
                assert!(msg.contains("API key is required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builder_custom_timeout_and_http_client() {
        let http = reqwest::Client::new();
        let client = Client::builder()
            .api_key("test-key")
            .timeout(Duration::from_secs(5))
            .http_client(http)
            .build()
            .unwrap();
        assert_eq!(client.api_key(), "test-key");
    }
}
