//! StreamRelay AI - upstream access for the streaming relay
//!
//! This crate provides:
//! - A vendor adapter abstraction over upstream request/response shapes
//! - OpenAI and Gemini adapters
//! - The relay pipeline that turns an upstream SSE body into normalized
//!   relay events

pub mod error;
mod http_client;
pub mod llm;
pub mod relay;

pub use error::{RelayError, Result};
pub use llm::{
    DEFAULT_TEMPERATURE, GeminiAdapter, OpenAIAdapter, Provider, UpstreamClient, VendorAdapter,
};
pub use relay::{
    DEFAULT_MAX_INPUT_CHARS, DEFAULT_PERSONA_PROMPT, Relay, RelayConfig, RelayStream,
    build_upstream_messages, relay_body, truncate_chars,
};
