//! Google Gemini streamGenerateContent adapter

use reqwest::RequestBuilder;
use serde_json::{Value, json};
use streamrelay_contracts::{ChatMessage, Role};

use super::VendorAdapter;

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiAdapter;

impl VendorAdapter for GeminiAdapter {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    fn default_base_url(&self) -> &'static str {
        "https://generativelanguage.googleapis.com/v1beta"
    }

    fn default_model(&self) -> &'static str {
        "gemini-1.5-flash"
    }

    fn endpoint(&self, base_url: &str, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            base_url.trim_end_matches('/'),
            model
        )
    }

    fn authorize(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder {
        request.header("x-goog-api-key", api_key)
    }

    fn request_body(&self, _model: &str, messages: &[ChatMessage], temperature: f32) -> Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        // Gemini calls the assistant side "model"
        let contents: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": { "temperature": temperature },
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }
        body
    }

    fn extract_token(&self, payload: &Value) -> Option<String> {
        let parts = payload
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)?;

        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();

        if text.is_empty() { None } else { Some(text) }
    }

    fn terminates_with_sentinel(&self) -> bool {
        false
    }
}
