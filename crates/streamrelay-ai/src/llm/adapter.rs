//! Vendor adapter trait

use reqwest::RequestBuilder;
use serde_json::Value;
use streamrelay_contracts::ChatMessage;

/// Describes how one upstream vendor is called and how its stream is read.
///
/// The relay pipeline is vendor-agnostic; everything that differs between
/// upstream APIs (URL layout, credential header, request body, where the
/// token lives in each streamed payload) goes through this trait.
pub trait VendorAdapter: Send + Sync + std::fmt::Debug {
    /// Provider name used in logs and errors
    fn provider(&self) -> &'static str;

    fn default_base_url(&self) -> &'static str;

    fn default_model(&self) -> &'static str;

    /// Streaming endpoint for the given base URL and model
    fn endpoint(&self, base_url: &str, model: &str) -> String;

    /// Attach the credential in the vendor's header shape
    fn authorize(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder;

    /// Build a streaming request body. `messages` already starts with the
    /// persona system message.
    fn request_body(&self, model: &str, messages: &[ChatMessage], temperature: f32) -> Value;

    /// Token delta carried by one parsed payload, if any
    fn extract_token(&self, payload: &Value) -> Option<String>;

    /// Error reported in-band by the upstream stream, if any
    fn extract_error(&self, payload: &Value) -> Option<String> {
        payload
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Whether the upstream ends its stream with the `[DONE]` sentinel.
    /// Vendors that don't are considered complete on a clean end of body.
    fn terminates_with_sentinel(&self) -> bool {
        true
    }
}
