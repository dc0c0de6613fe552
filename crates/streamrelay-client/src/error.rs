use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Relay returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Conversation store error: {0}")]
    Store(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
