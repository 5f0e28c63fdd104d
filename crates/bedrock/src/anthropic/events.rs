//! Anthropic streaming events, delivered inside event-stream `chunk` frames
//! as base64 JSON.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use riverbed_eventstream::Frame;
use riverbed_tool_runtime::Usage;
use serde::Deserialize;
use tracing::trace;

use super::response::AnthropicUsage;
use crate::error::BedrockError;
use crate::payload::{
    exception_payload, is_error_frame, payload_json, BlockDelta, BlockStart, PayloadDecoder,
    StreamPayload,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicEvent {
    MessageStart {
        message: MessageStartBody,
    },
    ContentBlockStart {
        index: u64,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: u64,
        delta: Delta,
    },
    ContentBlockStop {
        index: u64,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<OutputUsage>,
    },
    MessageStop {
        #[serde(rename = "amazon-bedrock-invocationMetrics", default)]
        metrics: Option<InvocationMetrics>,
    },
    Ping,
    Error {
        error: ErrorBody,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageStartBody {
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    /// Encrypted reasoning; only the block boundary is surfaced.
    RedactedThinking,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    SignatureDelta,
    CitationsDelta,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputUsage {
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvocationMetrics {
    #[serde(default)]
    input_token_count: u32,
    #[serde(default)]
    output_token_count: u32,
    #[serde(default)]
    cache_read_input_token_count: Option<u32>,
    #[serde(default)]
    cache_write_input_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    bytes: String,
}

/// Usage arrives in halves: input counts on `message_start`, output counts
/// on `message_delta`. Both are reported together at `message_stop`.
#[derive(Debug, Default)]
pub struct AnthropicDecoder {
    usage: Usage,
}

impl AnthropicDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_event(&mut self, event: AnthropicEvent) -> Result<Vec<StreamPayload>, BedrockError> {
        let payloads = match event {
            AnthropicEvent::MessageStart { message } => {
                self.usage = message.usage.into();
                vec![StreamPayload::MessageStart]
            }
            AnthropicEvent::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                ContentBlock::Text { text } => {
                    let mut out = vec![StreamPayload::BlockStart {
                        index,
                        start: BlockStart::Text,
                    }];
                    if !text.is_empty() {
                        out.push(StreamPayload::BlockDelta {
                            index,
                            delta: BlockDelta::Text(text),
                        });
                    }
                    out
                }
                ContentBlock::ToolUse { id, name } => vec![StreamPayload::BlockStart {
                    index,
                    start: BlockStart::ToolUse { id, name },
                }],
                ContentBlock::Thinking { thinking } => {
                    let mut out = vec![StreamPayload::BlockStart {
                        index,
                        start: BlockStart::Thinking,
                    }];
                    if !thinking.is_empty() {
                        out.push(StreamPayload::BlockDelta {
                            index,
                            delta: BlockDelta::Reasoning(thinking),
                        });
                    }
                    out
                }
                ContentBlock::RedactedThinking => vec![StreamPayload::BlockStart {
                    index,
                    start: BlockStart::Thinking,
                }],
                ContentBlock::Unknown => {
                    return Err(BedrockError::protocol(format!(
                        "unknown content block type at index {index}"
                    )))
                }
            },
            AnthropicEvent::ContentBlockDelta { index, delta } => {
                let delta = match delta {
                    Delta::TextDelta { text } => BlockDelta::Text(text),
                    Delta::InputJsonDelta { partial_json } => BlockDelta::ToolInput(partial_json),
                    Delta::ThinkingDelta { thinking } => BlockDelta::Reasoning(thinking),
                    Delta::CitationsDelta => {
                        return Err(BedrockError::protocol(
                            "citations are not supported by the Anthropic dialect",
                        ))
                    }
                    Delta::SignatureDelta | Delta::Unknown => {
                        return Ok(vec![StreamPayload::Ignored {
                            event_type: "content_block_delta".to_string(),
                        }])
                    }
                };
                vec![StreamPayload::BlockDelta { index, delta }]
            }
            AnthropicEvent::ContentBlockStop { index } => vec![StreamPayload::BlockStop { index }],
            AnthropicEvent::MessageDelta { delta, usage } => {
                if let Some(usage) = usage {
                    self.usage.completion_tokens = usage.output_tokens;
                }
                vec![StreamPayload::MessageStop {
                    stop_reason: delta.stop_reason,
                }]
            }
            AnthropicEvent::MessageStop { metrics } => {
                let usage = match metrics {
                    Some(m) => Usage {
                        prompt_tokens: m.input_token_count,
                        completion_tokens: m.output_token_count,
                        cache_write_tokens: m
                            .cache_write_input_token_count
                            .or(self.usage.cache_write_tokens),
                        cache_read_tokens: m
                            .cache_read_input_token_count
                            .or(self.usage.cache_read_tokens),
                    },
                    None => self.usage,
                };
                vec![StreamPayload::Metadata { usage }]
            }
            AnthropicEvent::Ping => vec![StreamPayload::Ignored {
                event_type: "ping".to_string(),
            }],
            AnthropicEvent::Error { error } => vec![StreamPayload::Exception {
                event_type: error.kind,
                message: error.message,
            }],
            AnthropicEvent::Unknown => {
                trace!("ignoring unknown Anthropic event");
                vec![StreamPayload::Ignored {
                    event_type: "unknown".to_string(),
                }]
            }
        };
        Ok(payloads)
    }
}

impl PayloadDecoder for AnthropicDecoder {
    fn decode(&mut self, frame: &Frame) -> Result<Vec<StreamPayload>, BedrockError> {
        if is_error_frame(frame) {
            return Ok(vec![exception_payload(frame)]);
        }
        if frame.event_type != "chunk" {
            trace!(event_type = %frame.event_type, "ignoring non-chunk frame");
            return Ok(vec![StreamPayload::Ignored {
                event_type: frame.event_type.clone(),
            }]);
        }

        let chunk: Chunk = serde_json::from_value(payload_json(frame)?)
            .map_err(|e| BedrockError::protocol(format!("malformed chunk frame: {e}")))?;
        let raw = STANDARD
            .decode(chunk.bytes.as_bytes())
            .map_err(|e| BedrockError::protocol(format!("chunk bytes are not base64: {e}")))?;
        let event: AnthropicEvent = serde_json::from_slice(&raw)
            .map_err(|e| BedrockError::protocol(format!("malformed Anthropic event: {e}")))?;

        self.decode_event(event)
    }
}
