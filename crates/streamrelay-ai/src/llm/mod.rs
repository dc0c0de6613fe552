//! LLM module - upstream vendor abstraction

mod adapter;
mod client;
mod factory;
mod gemini;
mod openai;

pub use adapter::VendorAdapter;
pub use client::{DEFAULT_TEMPERATURE, UpstreamClient};
pub use factory::Provider;
pub use gemini::GeminiAdapter;
pub use openai::OpenAIAdapter;
