//! OpenAI chat completions adapter

use reqwest::RequestBuilder;
use serde_json::{Value, json};
use streamrelay_contracts::ChatMessage;

use super::VendorAdapter;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAIAdapter;

impl VendorAdapter for OpenAIAdapter {
    fn provider(&self) -> &'static str {
        "openai"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.openai.com/v1"
    }

    fn default_model(&self) -> &'static str {
        "gpt-4o-mini"
    }

    fn endpoint(&self, base_url: &str, _model: &str) -> String {
        format!("{}/chat/completions", base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder {
        request.header("Authorization", format!("Bearer {}", api_key))
    }

    fn request_body(&self, model: &str, messages: &[ChatMessage], temperature: f32) -> Value {
        json!({
            "model": model,
            "stream": true,
            "messages": messages,
            "temperature": temperature,
        })
    }

    fn extract_token(&self, payload: &Value) -> Option<String> {
        payload
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}
