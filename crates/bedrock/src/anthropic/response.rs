use riverbed_tool_runtime::{
    parse_tool_arguments, Completion, FinishReason, ResponseMeta, ToolCall, Usage,
};
use serde::Deserialize;
use serde_json::Value;

use super::map_finish_reason;
use crate::error::BedrockError;

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

/// Anthropic `usage`, shared by `/invoke` responses and `message_start` events.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u32>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u32>,
}

impl From<AnthropicUsage> for Usage {
    fn from(u: AnthropicUsage) -> Self {
        Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            cache_write_tokens: u.cache_creation_input_tokens,
            cache_read_tokens: u.cache_read_input_tokens,
        }
    }
}

pub fn parse_completion(body: Value) -> Result<Completion, BedrockError> {
    let response: MessageResponse = serde_json::from_value(body).map_err(|e| {
        BedrockError::InvalidResponse(format!("unexpected Anthropic response: {e}"))
    })?;

    let finish_reason = match response.stop_reason.as_deref() {
        Some(reason) => map_finish_reason(reason).ok_or_else(|| {
            BedrockError::protocol(format!("unknown Anthropic stop reason {reason:?}"))
        })?,
        None => FinishReason::Unknown,
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(&t),
            ContentBlock::ToolUse { id, name, input } => {
                let arguments = match input {
                    Value::String(raw) => parse_tool_arguments(&raw),
                    Value::Null => parse_tool_arguments(""),
                    other => other,
                };
                tool_calls.push(ToolCall::new(id, name, arguments));
            }
            ContentBlock::Other => {}
        }
    }

    Ok(Completion {
        text,
        finish_reason,
        tool_calls,
        citations: Vec::new(),
        usage: response.usage.into(),
        meta: ResponseMeta {
            id: response.id,
            model: response.model,
        },
    })
}
