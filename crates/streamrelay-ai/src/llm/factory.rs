//! Provider selection

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::llm::{GeminiAdapter, OpenAIAdapter, VendorAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAI,
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Gemini => "gemini",
        }
    }

    /// Conventional environment variable holding this provider's key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn adapter(&self) -> Arc<dyn VendorAdapter> {
        match self {
            Self::OpenAI => Arc::new(OpenAIAdapter),
            Self::Gemini => Arc::new(GeminiAdapter),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(RelayError::UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAI);
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Gemini);
        assert!("anthropic".parse::<Provider>().is_err());
    }

    #[test]
    fn test_adapter_matches_provider() {
        for provider in [Provider::OpenAI, Provider::Gemini] {
            assert_eq!(provider.adapter().provider(), provider.as_str());
        }
    }
}
