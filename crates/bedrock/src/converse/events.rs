//! Typed payloads of `/converse-stream` events.

use riverbed_eventstream::Frame;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::trace;

use super::citations::{citation_from_converse, ConverseCitation};
use super::ConverseUsage;
use crate::error::BedrockError;
use crate::payload::{
    exception_payload, is_error_frame, BlockDelta, BlockStart, PayloadDecoder, StreamPayload,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentBlockStart {
    content_block_index: u64,
    #[serde(default)]
    start: StartShape,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartShape {
    #[serde(default)]
    tool_use: Option<ToolUseStart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolUseStart {
    tool_use_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentBlockDelta {
    content_block_index: u64,
    delta: DeltaShape,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeltaShape {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool_use: Option<ToolUseDelta>,
    #[serde(default)]
    reasoning_content: Option<ReasoningDelta>,
    #[serde(default)]
    citation: Option<ConverseCitation>,
}

#[derive(Debug, Deserialize)]
struct ToolUseDelta {
    #[serde(default)]
    input: String,
}

/// Signature and redacted content deltas carry no text and are dropped.
#[derive(Debug, Deserialize)]
struct ReasoningDelta {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentBlockStop {
    content_block_index: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageStop {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    usage: ConverseUsage,
}

fn parse<T: DeserializeOwned>(frame: &Frame) -> Result<T, BedrockError> {
    serde_json::from_slice(&frame.payload).map_err(|e| {
        BedrockError::protocol(format!("malformed {} payload: {e}", frame.event_type))
    })
}

/// Stateless: every Converse frame is self-describing.
#[derive(Debug, Default)]
pub struct ConverseDecoder;

impl ConverseDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadDecoder for ConverseDecoder {
    fn decode(&mut self, frame: &Frame) -> Result<Vec<StreamPayload>, BedrockError> {
        if is_error_frame(frame) {
            return Ok(vec![exception_payload(frame)]);
        }

        let payload = match frame.event_type.as_str() {
            "messageStart" => StreamPayload::MessageStart,
            "contentBlockStart" => {
                let event: ContentBlockStart = parse(frame)?;
                let start = match event.start.tool_use {
                    Some(tool) => BlockStart::ToolUse {
                        id: tool.tool_use_id,
                        name: tool.name,
                    },
                    None => BlockStart::Text,
                };
                StreamPayload::BlockStart {
                    index: event.content_block_index,
                    start,
                }
            }
            "contentBlockDelta" => {
                let event: ContentBlockDelta = parse(frame)?;
                let index = event.content_block_index;
                let d = event.delta;
                let delta = if let Some(text) = d.text {
                    BlockDelta::Text(text)
                } else if let Some(tool) = d.tool_use {
                    BlockDelta::ToolInput(tool.input)
                } else if let Some(reasoning) = d.reasoning_content {
                    BlockDelta::Reasoning(reasoning.text)
                } else if let Some(citation) = d.citation {
                    BlockDelta::Citation(citation_from_converse(citation))
                } else {
                    trace!(index, "delta without a known field");
                    return Ok(vec![StreamPayload::Ignored {
                        event_type: frame.event_type.clone(),
                    }]);
                };
                StreamPayload::BlockDelta { index, delta }
            }
            "contentBlockStop" => {
                let event: ContentBlockStop = parse(frame)?;
                StreamPayload::BlockStop {
                    index: event.content_block_index,
                }
            }
            "messageStop" => {
                let event: MessageStop = parse(frame)?;
                StreamPayload::MessageStop {
                    stop_reason: event.stop_reason,
                }
            }
            "metadata" => {
                let event: Metadata = parse(frame)?;
                StreamPayload::Metadata {
                    usage: event.usage.into(),
                }
            }
            other => {
                trace!(event_type = other, "ignoring unknown Converse event");
                StreamPayload::Ignored {
                    event_type: other.to_string(),
                }
            }
        };
        Ok(vec![payload])
    }
}
