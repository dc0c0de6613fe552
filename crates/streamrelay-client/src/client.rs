//! Relay session driver
//!
//! One call to [`RelayClient::send_turn`] runs one chat turn:
//!
//! 1. the user message is appended to the conversation before sending
//! 2. an empty assistant placeholder is appended right after it
//! 3. the relay's SSE body is decoded incrementally and every token is
//!    appended to the placeholder, persisting the log each time
//! 4. `[DONE]` stops reading at once, even if more bytes are buffered
//!
//! Failures are turned into placeholder text rather than returned. Nothing
//! is retried.

use futures::StreamExt;
use reqwest::{Client, Response, Url};
use serde_json::Value;
use streamrelay_contracts::{ChatMessage, ChatTurnRequest, RelayEvent, SseDecoder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conversation::{Conversation, ConversationStore};
use crate::error::{ClientError, Result};
use crate::http_client::build_http_client;
use crate::sink::TokenSink;

/// Placeholder text when the relay never produced a stream
pub const FALLBACK_REPLY: &str = "Sorry, something went wrong. Please try again.";

/// Appended to a reply whose stream stopped before completing
pub const DEFAULT_INTERRUPTED_MARKER: &str = " [interrupted]";

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// `[DONE]` received
    Completed,
    /// The stream closed or failed before `[DONE]`
    Interrupted,
    /// The relay sent an `error` event
    UpstreamError {
        message: String,
        detail: Option<String>,
    },
    /// No stream was obtained
    RequestFailed(String),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    endpoint: Url,
    interrupted_marker: Option<String>,
}

impl RelayClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|err| ClientError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            client: build_http_client()?,
            endpoint,
            interrupted_marker: Some(DEFAULT_INTERRUPTED_MARKER.to_string()),
        })
    }

    /// Replace the interrupted marker; `None` leaves partial replies as they are
    pub fn with_interrupted_marker(mut self, marker: Option<String>) -> Self {
        self.interrupted_marker = marker;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Run one chat turn against the relay
    pub async fn send_turn(
        &self,
        conversation: &mut Conversation,
        text: &str,
        store: &dyn ConversationStore,
        sink: &mut dyn TokenSink,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let request = ChatTurnRequest::continue_with(conversation.history(), text);

        conversation.messages.push(ChatMessage::user(text));
        conversation.messages.push(ChatMessage::assistant(""));
        conversation.touch();
        persist(store, conversation);

        let mut turn = Turn {
            conversation,
            store,
            sink,
            received_tokens: false,
        };

        let outcome = self.run(&request, &mut turn, cancel).await;
        turn.settle(&outcome, self.interrupted_marker.as_deref()).await;

        info!(
            conversation = %turn.conversation.id,
            outcome = ?outcome,
            "Chat turn finished"
        );
        outcome
    }

    async fn run(
        &self,
        request: &ChatTurnRequest,
        turn: &mut Turn<'_>,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TurnOutcome::Cancelled,
            response = self.open_stream(request) => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Relay request failed");
                return TurnOutcome::RequestFailed(err.to_string());
            }
        };

        let mut body = std::pin::pin!(response.bytes_stream());
        let mut decoder = SseDecoder::new();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TurnOutcome::Cancelled,
                chunk = body.next() => chunk,
            };

            let (events, ended) = match chunk {
                Some(Ok(bytes)) => (decoder.push(&bytes), false),
                Some(Err(err)) => {
                    warn!(error = %err, "Relay stream failed");
                    return TurnOutcome::Interrupted;
                }
                None => (decoder.finish(), true),
            };

            for event in &events {
                match RelayEvent::from_sse(event) {
                    Some(RelayEvent::Token(token)) => turn.append(&token).await,
                    Some(RelayEvent::Done) => {
                        debug!(pending = decoder.pending_len(), "Relay sent [DONE]");
                        return TurnOutcome::Completed;
                    }
                    Some(RelayEvent::Error { message, detail }) => {
                        return TurnOutcome::UpstreamError { message, detail };
                    }
                    None => {}
                }
            }

            if ended {
                warn!("Relay stream closed without [DONE]");
                return TurnOutcome::Interrupted;
            }
        }
    }

    async fn open_stream(&self, request: &ChatTurnRequest) -> Result<Response> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| {
                    value
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or(body);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

/// Mutable state of one in-flight turn
struct Turn<'a> {
    conversation: &'a mut Conversation,
    store: &'a dyn ConversationStore,
    sink: &'a mut dyn TokenSink,
    received_tokens: bool,
}

impl Turn<'_> {
    fn reply_mut(&mut self) -> Option<&mut ChatMessage> {
        self.conversation.messages.last_mut()
    }

    async fn append(&mut self, text: &str) {
        if let Some(reply) = self.reply_mut() {
            reply.content.push_str(text);
        }
        self.received_tokens = true;
        self.conversation.touch();
        persist(self.store, self.conversation);
        self.sink.on_token(text).await;
    }

    async fn write_notice(&mut self, text: &str) {
        let Some(index) = self.conversation.messages.len().checked_sub(1) else {
            return;
        };
        self.conversation.mark_notice(index);
        let Some(reply) = self.reply_mut() else {
            return;
        };
        let text = if reply.content.is_empty() {
            text.trim_start()
        } else {
            text
        };
        reply.content.push_str(text);
        self.sink.on_token(text).await;
    }

    async fn settle(&mut self, outcome: &TurnOutcome, marker: Option<&str>) {
        match outcome {
            TurnOutcome::Completed => {}
            TurnOutcome::Interrupted => {
                if let Some(marker) = marker {
                    self.write_notice(marker).await;
                }
            }
            TurnOutcome::Cancelled => {
                if let Some(marker) = marker.filter(|_| self.received_tokens) {
                    self.write_notice(marker).await;
                }
            }
            TurnOutcome::UpstreamError { message, detail } => {
                if self.received_tokens {
                    if let Some(marker) = marker {
                        self.write_notice(marker).await;
                    }
                } else {
                    let text = match detail {
                        Some(detail) => format!("{}: {}", message, detail),
                        None => message.clone(),
                    };
                    self.write_notice(&text).await;
                }
            }
            TurnOutcome::RequestFailed(_) => {
                self.write_notice(FALLBACK_REPLY).await;
            }
        }

        self.conversation.refresh_title();
        self.conversation.touch();
        persist(self.store, self.conversation);
        self.sink.on_finish().await;
    }
}

fn persist(store: &dyn ConversationStore, conversation: &Conversation) {
    if let Err(err) = store.save(conversation) {
        warn!(conversation = %conversation.id, error = %err, "Failed to persist conversation");
    }
}
