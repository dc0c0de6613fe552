//! Events re-emitted by the relay to its callers

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::sse::SseEvent;

/// End-of-stream marker shared by OpenAI-style upstreams and the relay itself
pub const DONE_SENTINEL: &str = "[DONE]";

/// SSE event name carried by error frames
pub const ERROR_EVENT: &str = "error";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPayload {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Normalized relay event.
///
/// A relay session carries any number of `Token`s followed by at most one
/// terminal event (`Done` or `Error`). Nothing follows a terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Token(String),
    Error {
        message: String,
        detail: Option<String>,
    },
    Done,
}

impl RelayEvent {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(token.into())
    }

    pub fn error(message: impl Into<String>, detail: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            detail,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// SSE `event:` field, if the frame carries one
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            Self::Error { .. } => Some(ERROR_EVENT),
            _ => None,
        }
    }

    /// SSE `data:` payload
    pub fn data(&self) -> String {
        match self {
            Self::Token(token) => json!({ "token": token }).to_string(),
            Self::Error { message, detail } => {
                let mut payload = json!({ "message": message });
                if let Some(detail) = detail {
                    payload["detail"] = json!(detail);
                }
                payload.to_string()
            }
            Self::Done => DONE_SENTINEL.to_string(),
        }
    }

    /// Full SSE frame including the blank-line terminator
    pub fn to_frame(&self) -> String {
        match self.event_name() {
            Some(name) => format!("event: {}\ndata: {}\n\n", name, self.data()),
            None => format!("data: {}\n\n", self.data()),
        }
    }

    /// Interpret a decoded SSE event produced by the relay.
    ///
    /// Returns `None` for comments, payloads that are not JSON, and empty
    /// tokens. Those are keepalive noise rather than errors.
    pub fn from_sse(event: &SseEvent) -> Option<Self> {
        let SseEvent::Message { event, data } = event else {
            return None;
        };

        if data.trim() == DONE_SENTINEL {
            return Some(Self::Done);
        }

        if event.as_deref() == Some(ERROR_EVENT) {
            let payload = serde_json::from_str::<ErrorPayload>(data).unwrap_or(ErrorPayload {
                message: data.clone(),
                detail: None,
            });
            return Some(Self::Error {
                message: payload.message,
                detail: payload.detail,
            });
        }

        let payload: TokenPayload = serde_json::from_str(data).ok()?;
        if payload.token.is_empty() {
            return None;
        }
        Some(Self::Token(payload.token))
    }
}
