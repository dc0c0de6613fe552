//! StreamRelay client
//!
//! Drives one relay session per chat turn and reassembles the streamed
//! tokens into a local conversation log:
//! - [`RelayClient`] posts the turn and decodes the relay's SSE body
//! - [`Conversation`] and [`ConversationStore`] hold the ordered message log
//! - [`Smoother`] paces received text for display independently of arrival

pub mod client;
pub mod conversation;
pub mod error;
mod http_client;
pub mod sink;
pub mod smoother;

pub use client::{DEFAULT_INTERRUPTED_MARKER, FALLBACK_REPLY, RelayClient, TurnOutcome};
pub use conversation::{Conversation, ConversationStore, DEFAULT_TITLE, InMemoryStore};
pub use error::{ClientError, Result};
pub use sink::{ChannelSink, NullSink, TokenSink};
pub use smoother::{
    DEFAULT_TICK, DisplayBuffer, DisplaySnapshot, Phase, Smoother, SmootherInput, chunk_size,
};
