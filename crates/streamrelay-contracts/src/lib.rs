//! StreamRelay contracts
//!
//! Types shared by the relay server and its clients:
//! - Chat messages and the turn request accepted by `POST /chat`
//! - Relay events and their exact SSE wire encoding
//! - An incremental SSE decoder usable on any chunked byte stream

pub mod error;
pub mod event;
pub mod message;
pub mod sse;

pub use error::ContractError;
pub use event::{DONE_SENTINEL, ErrorPayload, RelayEvent, TokenPayload};
pub use message::{ChatMessage, ChatTurnRequest, Role, TurnInput};
pub use sse::{DEFAULT_MAX_LINE_LEN, SseDecoder, SseEvent};
