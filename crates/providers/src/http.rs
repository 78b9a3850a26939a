//! Shared HTTP transport for every vendor adapter.
//!
//! Adapters hand over a URL and a JSON body; the transport applies
//! authentication, sends the request and maps failures onto
//! [`ProviderError`]. A 2xx body is returned as text so parse failures can
//! carry it verbatim.

use scribe_core::error::ProviderError;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// How a request is authenticated.
#[derive(Clone)]
pub enum Auth {
    None,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// A vendor-specific header such as `x-api-key` or `api-key`.
    Header { name: String, value: String },
    /// Key carried in the query string (`?key=...`).
    QueryParam { name: String, value: String },
}

impl Auth {
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Header {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn query(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::QueryParam {
            name: name.into(),
            value: value.into(),
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::None => request,
            Self::Bearer(token) => request.bearer_auth(token),
            Self::Header { name, value } => request.header(name.as_str(), value.as_str()),
            Self::QueryParam { name, value } => request.query(&[(name.as_str(), value.as_str())]),
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Self::Header { name, .. } => write!(f, "Header({name}: [REDACTED])"),
            Self::QueryParam { name, .. } => write!(f, "QueryParam({name}=[REDACTED])"),
        }
    }
}

/// A reqwest client plus the authentication strategy of one vendor.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    auth: Auth,
    headers: Vec<(String, String)>,
}

impl HttpTransport {
    pub fn new(auth: Auth, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            auth,
            headers: Vec::new(),
        })
    }

    /// Add a static header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// POST a JSON body and return the 2xx response body as text.
    pub async fn post_json(
        &self,
        provider: &str,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<String, ProviderError> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = self.auth.apply(request);

        debug!(provider, url, "Sending completion request");

        let response = request.send().await.map_err(|e| classify(provider, e))?;
        let status = response.status();

        // A connection dropped mid-body is a transport fault like any other.
        let text = response.text().await.map_err(|e| classify(provider, e))?;

        if !status.is_success() {
            warn!(provider, status = status.as_u16(), body = %text, "Provider returned error");
            return Err(ProviderError::Api {
                status_code: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

fn classify(provider: &str, error: reqwest::Error) -> ProviderError {
    warn!(provider, error = %error, "Provider request failed");
    if error.is_timeout() {
        ProviderError::Timeout(error.to_string())
    } else {
        ProviderError::Network(error.to_string())
    }
}

/// Deserialize a 2xx body, keeping the raw text on failure.
pub fn parse_body<T: DeserializeOwned>(provider: &str, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| {
        warn!(provider, error = %e, "Unreadable provider response");
        ProviderError::parse(format!("{provider} response: {e}"), body)
    })
}
