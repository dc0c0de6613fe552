//! Chat messages and the turn request accepted by the relay

use serde::{Deserialize, Serialize};

use crate::error::ContractError;

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /chat`.
///
/// Two shapes are accepted in the same object: a full `messages` list, or a
/// `history` plus the new `message`. When both are present `messages` wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurnRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
}

/// Borrowed view of whichever request shape the caller used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnInput<'a> {
    Messages(&'a [ChatMessage]),
    Continue {
        history: &'a [ChatMessage],
        message: &'a str,
    },
}

impl ChatTurnRequest {
    /// Request shape carrying prior history and a new user message
    pub fn continue_with(history: Vec<ChatMessage>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            history,
            messages: None,
        }
    }

    /// Request shape carrying the full message list
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            message: None,
            history: Vec::new(),
            messages: Some(messages),
        }
    }

    pub fn input(&self) -> Result<TurnInput<'_>, ContractError> {
        if let Some(messages) = &self.messages {
            return Ok(TurnInput::Messages(messages));
        }

        match &self.message {
            Some(message) => Ok(TurnInput::Continue {
                history: &self.history,
                message,
            }),
            None => Err(ContractError::EmptyTurn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_history_shape() {
        let request: ChatTurnRequest = serde_json::from_str(
            r#"{"message":"Hi","history":[{"role":"user","content":"earlier"}]}"#,
        )
        .unwrap();

        assert_eq!(
            request.input().unwrap(),
            TurnInput::Continue {
                history: &[ChatMessage::user("earlier")],
                message: "Hi",
            }
        );
    }

    #[test]
    fn test_messages_shape_wins() {
        let request: ChatTurnRequest = serde_json::from_str(
            r#"{"message":"ignored","messages":[{"role":"user","content":"a"}]}"#,
        )
        .unwrap();

        assert_eq!(
            request.input().unwrap(),
            TurnInput::Messages(&[ChatMessage::user("a")])
        );
    }

    #[test]
    fn test_empty_body_is_rejected() {
        let request: ChatTurnRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.input(), Err(ContractError::EmptyTurn));
    }

    #[test]
    fn test_history_request_omits_unused_fields() {
        let json = serde_json::to_string(&ChatTurnRequest::continue_with(vec![], "Hi")).unwrap();
        assert_eq!(json, r#"{"message":"Hi"}"#);
    }
}
