//! Client-side stream consumer for Curio.
//!
//! Separates network plumbing from state derivation: the SSE parser and
//! transport produce typed events, and a pure reducer folds them into the
//! local message list. Reconnection runs with bounded exponential backoff.

mod consumer;
mod message;
mod sse;

pub use consumer::{
    ClientError, ConnectionStatus, EventStream, EventTransport, SseTransport, StreamConsumer,
    backoff_delay,
};
pub use message::{Conversation, FunctionView, Message, MessageRole};
pub use sse::{SseFrame, SseParser};
