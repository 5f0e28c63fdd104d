//! Dialect-neutral view of one frame's payload.

use riverbed_eventstream::Frame;
use riverbed_tool_runtime::{Citation, Usage};
use serde_json::Value;

use crate::error::BedrockError;

#[derive(Debug, Clone, PartialEq)]
pub enum BlockStart {
    Text,
    ToolUse { id: String, name: String },
    Thinking,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockDelta {
    Text(String),
    /// A fragment of a tool call's JSON arguments.
    ToolInput(String),
    Reasoning(String),
    Citation(Citation),
}

/// What a frame means, once the dialect's JSON has been read.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    MessageStart,
    BlockStart { index: u64, start: BlockStart },
    BlockDelta { index: u64, delta: BlockDelta },
    BlockStop { index: u64 },
    MessageStop { stop_reason: Option<String> },
    Metadata { usage: Usage },
    Exception { event_type: String, message: String },
    /// Recognised but carries nothing for the event stream (e.g. pings).
    Ignored { event_type: String },
}

/// Turns frames of one dialect into [`StreamPayload`]s.
///
/// Decoders may hold state across frames (the Anthropic dialect reports
/// usage in two halves), so one decoder serves exactly one response.
pub trait PayloadDecoder: Send {
    fn decode(&mut self, frame: &Frame) -> Result<Vec<StreamPayload>, BedrockError>;
}

/// Parse a frame payload as JSON.
pub(crate) fn payload_json(frame: &Frame) -> Result<Value, BedrockError> {
    serde_json::from_slice(&frame.payload).map_err(|e| {
        BedrockError::protocol(format!("{} payload is not JSON: {e}", frame.event_type))
    })
}

/// Error names Bedrock sends mid-stream. They may arrive as the
/// `:exception-type` of an exception frame or as a plain `:event-type`.
pub(crate) const ERROR_EVENT_TYPES: [&str; 5] = [
    "throttlingException",
    "internalServerException",
    "modelStreamErrorException",
    "serviceUnavailableException",
    "validationException",
];

/// True for exception and error frames, and for events named after an error.
pub(crate) fn is_error_frame(frame: &Frame) -> bool {
    frame.is_exception() || ERROR_EVENT_TYPES.contains(&frame.event_type.as_str())
}

/// The exception payload for a frame that [`is_error_frame`] accepts.
pub(crate) fn exception_payload(frame: &Frame) -> StreamPayload {
    let message = serde_json::from_slice::<Value>(&frame.payload)
        .ok()
        .and_then(|v| v["message"].as_str().or(v["Message"].as_str()).map(String::from))
        .or_else(|| frame.payload_str().map(String::from))
        .unwrap_or_default();
    StreamPayload::Exception {
        event_type: frame.event_type.clone(),
        message,
    }
}
