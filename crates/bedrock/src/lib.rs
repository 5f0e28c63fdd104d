//! Amazon Bedrock runtime provider.
//!
//! Requests are rendered in one of two wire dialects (see [`Dialect`]):
//! the model-agnostic Converse API or the Anthropic Messages body sent
//! through `invoke`. Streamed responses arrive as binary event-stream
//! frames; each dialect's [`PayloadDecoder`] turns frame payloads into
//! typed [`StreamPayload`]s and a single [`EventProcessor`] turns those into
//! [`riverbed_tool_runtime::StreamEvent`]s while updating a [`StreamState`].

pub mod anthropic;
pub mod client;
pub mod converse;
pub mod dialect;
pub mod error;
pub mod payload;
pub mod processor;
pub mod state;
pub mod transport;

pub use client::BedrockProvider;
pub use dialect::{Capability, Dialect};
pub use error::BedrockError;
pub use payload::{BlockDelta, BlockStart, PayloadDecoder, StreamPayload};
pub use processor::EventProcessor;
pub use state::{BlockKind, PendingToolCall, StreamState};
pub use transport::{HttpRequest, HttpTransport, Transport};
