//! Local conversation log

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use streamrelay_contracts::{ChatMessage, Role};

use crate::error::{ClientError, Result};

/// Title used until the first exchange completes
pub const DEFAULT_TITLE: &str = "New chat";

const MAX_TITLE_CHARS: usize = 48;

/// Ordered, append-only message log for one chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    /// Last modification, unix milliseconds
    pub updated_at: i64,
    /// Message index to the byte offset where client-written text starts
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notices: BTreeMap<usize, usize>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            updated_at: Utc::now().timestamp_millis(),
            notices: BTreeMap::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().timestamp_millis();
    }

    /// Record that text appended to message `index` from now on is a local notice
    pub fn mark_notice(&mut self, index: usize) {
        if let Some(message) = self.messages.get(index) {
            self.notices.entry(index).or_insert(message.content.len());
        }
    }

    /// Messages to send as prior turns: notices stripped, blank entries dropped
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .enumerate()
            .filter_map(|(index, message)| {
                let content = match self.notices.get(&index) {
                    Some(&end) => message.content.get(..end).unwrap_or(&message.content),
                    None => message.content.as_str(),
                };
                if content.trim().is_empty() {
                    return None;
                }
                Some(ChatMessage {
                    role: message.role,
                    content: content.to_string(),
                })
            })
            .collect()
    }

    /// Derive the title from the first user message
    pub fn refresh_title(&mut self) {
        let Some(first) = self.messages.iter().find(|m| m.role == Role::User) else {
            return;
        };

        let text = first.content.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return;
        }

        self.title = match text.char_indices().nth(MAX_TITLE_CHARS) {
            Some((end, _)) => format!("{}…", &text[..end]),
            None => text,
        };
    }
}

/// Persistence for conversation logs
pub trait ConversationStore: Send + Sync {
    fn save(&self, conversation: &Conversation) -> Result<()>;
    fn load(&self, id: &str) -> Result<Option<Conversation>>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryStore {
    fn save(&self, conversation: &Conversation) -> Result<()> {
        let mut conversations = self
            .conversations
            .write()
            .map_err(|_| ClientError::Store("conversation lock poisoned".to_string()))?;
        conversations.insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<Conversation>> {
        let conversations = self
            .conversations
            .read()
            .map_err(|_| ClientError::Store("conversation lock poisoned".to_string()))?;
        Ok(conversations.get(id).cloned())
    }
}
