//! Upstream streaming client

use std::fmt;
use std::sync::Arc;

use reqwest::{Client, Response};
use streamrelay_contracts::ChatMessage;

use crate::error::{RelayError, Result};
use crate::http_client::build_http_client;
use crate::llm::VendorAdapter;

/// Longest upstream error body forwarded downstream, in bytes
const MAX_ERROR_BODY: usize = 512;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Upstream LLM client.
///
/// Built once at startup from configuration and cloned into each relay
/// session. Cloning shares the underlying connection pool.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    adapter: Arc<dyn VendorAdapter>,
    api_key: Option<String>,
    model: String,
    base_url: String,
    temperature: f32,
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("provider", &self.adapter.provider())
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("has_credential", &self.api_key.is_some())
            .finish()
    }
}

impl UpstreamClient {
    /// Create a client using the adapter's default model and base URL
    pub fn new(adapter: Arc<dyn VendorAdapter>) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            model: adapter.default_model().to_string(),
            base_url: adapter.default_base_url().to_string(),
            adapter,
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = if api_key.trim().is_empty() {
            None
        } else {
            Some(api_key)
        };
        self
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn provider(&self) -> &'static str {
        self.adapter.provider()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn adapter(&self) -> &Arc<dyn VendorAdapter> {
        &self.adapter
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send a streaming request and return the response once headers arrive.
    ///
    /// Non-success statuses are turned into [`RelayError::UpstreamHttp`]
    /// carrying the (truncated) response body. No retries.
    pub async fn open_stream(&self, messages: &[ChatMessage]) -> Result<Response> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RelayError::MissingCredential(self.provider().to_string()))?;

        let body = self
            .adapter
            .request_body(&self.model, messages, self.temperature);
        let request = self
            .client
            .post(self.adapter.endpoint(&self.base_url, &self.model))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body);

        let response = self.adapter.authorize(request, api_key).send().await?;
        if !response.status().is_success() {
            return Err(response_to_error(response, self.provider()).await);
        }

        Ok(response)
    }
}

pub(crate) async fn response_to_error(response: Response, provider: &str) -> RelayError {
    let status = response.status();
    let reason = status.canonical_reason().unwrap_or_default().to_string();
    let body = response.text().await.unwrap_or_default();

    // Truncate error body to prevent leaking large or sensitive responses.
    let message = if body.trim().is_empty() {
        reason.clone()
    } else if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &body[..end])
    } else {
        body
    };

    RelayError::UpstreamHttp {
        provider: provider.to_string(),
        status: status.as_u16(),
        reason,
        message,
    }
}
