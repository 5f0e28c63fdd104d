use riverbed_tool_runtime::{
    parse_tool_arguments, Completion, FinishReason, ResponseMeta, ToolCall, Usage,
};
use serde::Deserialize;
use serde_json::Value;

use super::citations::{group_from_converse, CitationsContent};
use super::{map_finish_reason, ConverseUsage};
use crate::error::BedrockError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: Output,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ConverseUsage,
}

#[derive(Debug, Deserialize)]
struct Output {
    message: OutputMessage,
}

#[derive(Debug, Deserialize)]
struct OutputMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool_use: Option<ToolUseBlock>,
    #[serde(default)]
    citations_content: Option<CitationsContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolUseBlock {
    tool_use_id: String,
    name: String,
    #[serde(default)]
    input: Value,
}

/// Read a `/converse` response body. Converse reports no response id or model.
pub fn parse_completion(body: Value) -> Result<Completion, BedrockError> {
    let response: ConverseResponse = serde_json::from_value(body)
        .map_err(|e| BedrockError::InvalidResponse(format!("unexpected Converse response: {e}")))?;

    let finish_reason = match response.stop_reason.as_deref() {
        Some(reason) => map_finish_reason(reason).ok_or_else(|| {
            BedrockError::protocol(format!("unknown Converse stop reason {reason:?}"))
        })?,
        None => FinishReason::Unknown,
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut citations = Vec::new();
    for block in response.output.message.content {
        if let Some(t) = block.text {
            text.push_str(&t);
        }
        if let Some(use_) = block.tool_use {
            let arguments = match use_.input {
                Value::String(raw) => parse_tool_arguments(&raw),
                Value::Null => parse_tool_arguments(""),
                other => other,
            };
            tool_calls.push(ToolCall::new(use_.tool_use_id, use_.name, arguments));
        }
        if let Some(cited) = block.citations_content {
            let group = group_from_converse(cited);
            text.push_str(&group.output_text);
            citations.push(group);
        }
    }

    Ok(Completion {
        text,
        finish_reason,
        tool_calls,
        citations,
        usage: Usage::from(response.usage),
        meta: ResponseMeta::default(),
    })
}
