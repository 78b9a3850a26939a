//! HTTP client for the source backend.
//!
//! The backend is an opaque resource store addressed by URL. Objects are
//! read with `GET`, replaced with `PUT` and created with `POST`; bodies are
//! plain text.

use async_trait::async_trait;
use scribe_config::BackendSettings;
use scribe_core::error::ToolError;
use scribe_core::tool::ResourceFetcher;
use std::time::Duration;
use tracing::debug;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Option<String>,
    credentials: Option<(String, String)>,
}

impl BackendClient {
    pub fn new(timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::Unreachable(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: None,
            credentials: None,
        })
    }

    /// Build a client from the `[backend]` section.
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, ToolError> {
        let mut client = Self::new(Duration::from_secs(settings.timeout_secs))?;
        if let Some(base_url) = &settings.base_url {
            client = client.with_base_url(base_url);
        }
        if let Some(username) = &settings.username {
            client = client.with_basic_auth(username, settings.password.clone().unwrap_or_default());
        }
        Ok(client)
    }

    /// Root that relative URLs are resolved against.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Absolute URL for `url`. Absolute inputs are returned unchanged.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match &self.base_url {
            Some(base) => format!("{base}/{}", url.trim_start_matches('/')),
            None => url.to_string(),
        }
    }

    /// Current text of the object at `url`; `None` when it does not exist.
    pub async fn get_text(&self, url: &str) -> Result<Option<String>, ToolError> {
        let url = self.resolve(url);
        debug!(url = %url, "GET backend object");
        let response = self.authorize(self.client.get(&url)).send().await;
        let response = response.map_err(|e| transport_error(&url, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_body(&url, response).await.map(Some)
    }

    /// Replace the object at `url` with `text`. Returns the response body.
    pub async fn put_text(&self, url: &str, text: &str) -> Result<String, ToolError> {
        let url = self.resolve(url);
        debug!(url = %url, len = text.len(), "PUT backend object");
        let request = self.client.put(&url);
        self.send_text(&url, request, text).await
    }

    /// Create an object at `url` with `text`. Returns the response body.
    pub async fn post_text(&self, url: &str, text: &str) -> Result<String, ToolError> {
        let url = self.resolve(url);
        debug!(url = %url, len = text.len(), "POST backend object");
        let request = self.client.post(&url);
        self.send_text(&url, request, text).await
    }

    async fn send_text(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
        text: &str,
    ) -> Result<String, ToolError> {
        let response = self
            .authorize(request)
            .header(reqwest::header::CONTENT_TYPE, TEXT_CONTENT_TYPE)
            .body(text.to_string())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;
        read_body(url, response).await
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("username", &self.credentials.as_ref().map(|(user, _)| user))
            .finish()
    }
}

#[async_trait]
impl ResourceFetcher for BackendClient {
    async fn fetch_text(&self, locator: &str) -> Result<Option<String>, ToolError> {
        self.get_text(locator).await
    }
}

async fn read_body(url: &str, response: reqwest::Response) -> Result<String, ToolError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| transport_error(url, e))?;
    if !status.is_success() {
        return Err(ToolError::Backend {
            status_code: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn transport_error(url: &str, error: reqwest::Error) -> ToolError {
    if error.is_timeout() {
        ToolError::Unreachable(format!("{url}: request timed out"))
    } else {
        ToolError::Unreachable(format!("{url}: {error}"))
    }
}
