//! The model-agnostic Converse API (`/converse`, `/converse-stream`).

pub mod citations;
pub mod events;
pub mod payload;
pub mod response;

use riverbed_tool_runtime::{FinishReason, Usage};
use serde::Deserialize;

pub use events::ConverseDecoder;
pub use payload::build_payload;
pub use response::parse_completion;

/// Converse `stopReason` values. Anything else is unknown to this client.
pub fn map_finish_reason(stop_reason: &str) -> Option<FinishReason> {
    let reason = match stop_reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" | "model_context_window_exceeded" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        "content_filtered" | "guardrail_intervened" => FinishReason::ContentFilter,
        _ => return None,
    };
    Some(reason)
}

/// `usage` object of both the `metadata` stream event and the `/converse` response.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConverseUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u32>,
    #[serde(default)]
    pub cache_write_input_tokens: Option<u32>,
}

impl From<ConverseUsage> for Usage {
    fn from(u: ConverseUsage) -> Self {
        Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            cache_write_tokens: u.cache_write_input_tokens,
            cache_read_tokens: u.cache_read_input_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_stop_reasons() {
        assert_eq!(map_finish_reason("end_turn"), Some(FinishReason::Stop));
        assert_eq!(map_finish_reason("stop_sequence"), Some(FinishReason::Stop));
        assert_eq!(map_finish_reason("max_tokens"), Some(FinishReason::Length));
        assert_eq!(map_finish_reason("tool_use"), Some(FinishReason::ToolCalls));
        assert_eq!(
            map_finish_reason("guardrail_intervened"),
            Some(FinishReason::ContentFilter)
        );
    }

    #[test]
    fn unknown_stop_reason_is_none() {
        assert_eq!(map_finish_reason("pause_turn"), None);
        assert_eq!(map_finish_reason(""), None);
    }
}
