//! Error types for the relay

use streamrelay_contracts::ContractError;
use thiserror::Error;

/// Relay error types
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("API key not configured for {0}")]
    MissingCredential(String),

    #[error("{provider} returned HTTP {status} {reason}: {message}")]
    UpstreamHttp {
        provider: String,
        status: u16,
        reason: String,
        message: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ContractError),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
