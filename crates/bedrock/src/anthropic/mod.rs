//! Anthropic Messages bodies sent through `/invoke` and
//! `/invoke-with-response-stream`.

pub mod events;
pub mod payload;
pub mod response;

use riverbed_tool_runtime::FinishReason;

pub use events::AnthropicDecoder;
pub use payload::build_payload;
pub use response::parse_completion;

pub const API_VERSION: &str = "bedrock-2023-05-31";

pub fn map_finish_reason(stop_reason: &str) -> Option<FinishReason> {
    let reason = match stop_reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" | "model_context_window_exceeded" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        "refusal" => FinishReason::ContentFilter,
        _ => return None,
    };
    Some(reason)
}
