//! Streaming relay pipeline
//!
//! Turns a chat turn into an upstream streaming call and re-emits the
//! upstream SSE body as normalized [`RelayEvent`]s:
//!
//! - every session ends with at most one terminal event (`Done` or `Error`),
//!   or simply stops when the upstream closed without a sentinel
//! - nothing is emitted after a terminal event
//! - non-JSON upstream payloads (keepalives, comments) are skipped silently
//! - nothing is retried

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::Value;
use streamrelay_contracts::{
    ChatMessage, ChatTurnRequest, DONE_SENTINEL, RelayEvent, Role, SseDecoder, SseEvent, TurnInput,
};

use crate::error::{RelayError, Result};
use crate::llm::{UpstreamClient, VendorAdapter};

/// Longest message content forwarded upstream, in characters
pub const DEFAULT_MAX_INPUT_CHARS: usize = 8000;

pub const DEFAULT_PERSONA_PROMPT: &str = "You are a friendly and knowledgeable assistant. \
Answer clearly and concisely, use Markdown for structure when it helps, \
and say so when you are not sure about something.";

/// Boxed stream of relay events
pub type RelayStream = Pin<Box<dyn Stream<Item = RelayEvent> + Send>>;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// System message prepended to every upstream request
    pub persona_prompt: String,
    /// Per-message content limit; longer content is cut without notice
    pub max_input_chars: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            persona_prompt: DEFAULT_PERSONA_PROMPT.to_string(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }
}

/// Keep at most `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Build the upstream message list for a turn.
///
/// The persona prompt is always the first and only system message: system
/// messages supplied by the caller are dropped.
pub fn build_upstream_messages(
    request: &ChatTurnRequest,
    config: &RelayConfig,
) -> Result<Vec<ChatMessage>> {
    let input = request.input()?;
    let limit = config.max_input_chars;

    let (prior, message) = match input {
        TurnInput::Messages(messages) => (messages, None),
        TurnInput::Continue { history, message } => (history, Some(message)),
    };

    let dropped = prior.iter().filter(|m| m.role == Role::System).count();
    if dropped > 0 {
        tracing::debug!(dropped, "Dropping caller-supplied system messages");
    }
    let blank = prior
        .iter()
        .filter(|m| m.role != Role::System && m.content.trim().is_empty())
        .count();
    if blank > 0 {
        tracing::debug!(blank, "Dropping blank history messages");
    }

    let mut messages = Vec::with_capacity(prior.len() + 2);
    messages.push(ChatMessage::system(config.persona_prompt.clone()));
    messages.extend(
        prior
            .iter()
            .filter(|m| m.role != Role::System && !m.content.trim().is_empty())
            .map(|m| ChatMessage {
                role: m.role,
                content: truncate_chars(&m.content, limit).to_string(),
            }),
    );
    if let Some(message) = message {
        messages.push(ChatMessage::user(truncate_chars(message, limit)));
    }

    Ok(messages)
}

/// The relay component: an upstream client plus the turn-shaping policy
#[derive(Debug, Clone)]
pub struct Relay {
    upstream: UpstreamClient,
    config: RelayConfig,
}

impl Relay {
    pub fn new(upstream: UpstreamClient, config: RelayConfig) -> Self {
        Self { upstream, config }
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn has_credential(&self) -> bool {
        self.upstream.has_credential()
    }

    pub fn prepare(&self, request: &ChatTurnRequest) -> Result<Vec<ChatMessage>> {
        build_upstream_messages(request, &self.config)
    }

    /// Open the upstream stream lazily and relay it.
    ///
    /// Nothing happens until the returned stream is first polled. Dropping
    /// the stream drops the upstream connection.
    pub fn stream(&self, messages: Vec<ChatMessage>) -> RelayStream {
        let upstream = self.upstream.clone();

        Box::pin(async_stream::stream! {
            let response = match upstream.open_stream(&messages).await {
                Ok(response) => response,
                Err(err) => {
                    yield upstream_failure(upstream.provider(), err);
                    return;
                }
            };

            tracing::debug!(
                provider = upstream.provider(),
                model = upstream.model(),
                "Upstream stream opened"
            );

            let mut events = relay_body(response.bytes_stream(), upstream.adapter().clone());
            while let Some(event) = events.next().await {
                yield event;
            }
        })
    }
}

fn upstream_failure(provider: &str, err: RelayError) -> RelayEvent {
    tracing::warn!(provider, error = %err, "Upstream request failed");

    match err {
        RelayError::UpstreamHttp {
            status,
            reason,
            message,
            ..
        } => {
            let status_text = format!("{} {}", status, reason);
            RelayEvent::error(
                format!("Upstream request failed: {}", status_text.trim_end()),
                Some(message),
            )
        }
        other => RelayEvent::error("Upstream request failed", Some(other.to_string())),
    }
}

/// Relay an upstream SSE body.
///
/// Works on any chunked byte stream; chunk boundaries need not line up with
/// SSE lines or UTF-8 characters.
pub fn relay_body<S, B, E>(body: S, adapter: Arc<dyn VendorAdapter>) -> RelayStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut body = Box::pin(body);
        let mut decoder = SseDecoder::new();
        let mut tokens = 0usize;
        let mut dropped = 0usize;

        loop {
            let (events, ended) = match body.next().await {
                Some(Ok(chunk)) => (decoder.push(chunk.as_ref()), false),
                Some(Err(err)) => {
                    tracing::warn!(
                        provider = adapter.provider(),
                        tokens,
                        error = %err,
                        "Upstream stream interrupted"
                    );
                    yield RelayEvent::error("Stream interrupted", Some(err.to_string()));
                    return;
                }
                None => (decoder.finish(), true),
            };

            if decoder.dropped_lines() > dropped {
                dropped = decoder.dropped_lines();
                tracing::warn!(
                    provider = adapter.provider(),
                    dropped,
                    "Dropped overlong upstream SSE line"
                );
            }

            for event in &events {
                let Some(relay_event) = interpret(adapter.as_ref(), event) else {
                    continue;
                };

                let terminal = relay_event.is_terminal();
                if !terminal {
                    tokens += 1;
                }
                yield relay_event;
                if terminal {
                    tracing::debug!(
                        provider = adapter.provider(),
                        tokens,
                        "Relay session finished"
                    );
                    return;
                }
            }

            if ended {
                if adapter.terminates_with_sentinel() {
                    tracing::warn!(
                        provider = adapter.provider(),
                        tokens,
                        "Upstream closed without [DONE]"
                    );
                } else {
                    tracing::debug!(
                        provider = adapter.provider(),
                        tokens,
                        "Relay session finished"
                    );
                    yield RelayEvent::Done;
                }
                return;
            }
        }
    })
}

fn interpret(adapter: &dyn VendorAdapter, event: &SseEvent) -> Option<RelayEvent> {
    let data = event.data()?;
    if data.trim() == DONE_SENTINEL {
        return Some(RelayEvent::Done);
    }

    let payload: Value = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(_) => {
            tracing::trace!(data, "Skipping non-JSON upstream payload");
            return None;
        }
    };

    if let Some(message) = adapter.extract_error(&payload) {
        return Some(RelayEvent::error("Upstream reported an error", Some(message)));
    }

    adapter
        .extract_token(&payload)
        .filter(|token| !token.is_empty())
        .map(RelayEvent::Token)
}
