use std::fmt;

use serde::{Deserialize, Serialize};

use crate::citation::{Citation, CitationGroup};
use crate::tool::{ToolCall, ToolResult};

/// Events emitted while streaming a response.
/// Provider-agnostic; translated from each wire dialect in the provider layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    StreamStart {
        message_id: String,
        model: String,
    },
    TextStart {
        message_id: String,
    },
    TextDelta {
        message_id: String,
        delta: String,
    },
    TextComplete {
        message_id: String,
    },
    ThinkingStart {
        reasoning_id: String,
    },
    ThinkingDelta {
        reasoning_id: String,
        delta: String,
    },
    ThinkingComplete {
        reasoning_id: String,
    },
    Citation {
        message_id: String,
        citation: Citation,
    },
    /// A tool call whose arguments are complete
    ToolCall {
        message_id: String,
        tool_call: ToolCall,
    },
    ToolResult {
        message_id: String,
        result: ToolResult,
    },
    /// Clean end of one round-trip
    StreamEnd {
        finish_reason: FinishReason,
        usage: Usage,
        citations: Vec<CitationGroup>,
    },
    /// Terminal failure; nothing follows it
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl StreamEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_terminal_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Why the model stopped generating, normalized across dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    /// No stop reason was reported
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u32>,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            ..Default::default()
        }
    }

    /// Accumulate another round-trip's counts.
    pub fn add(&mut self, other: &Usage) {
        fn sum(a: Option<u32>, b: Option<u32>) -> Option<u32> {
            match (a, b) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0).saturating_add(b.unwrap_or(0))),
            }
        }
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.cache_write_tokens = sum(self.cache_write_tokens, other.cache_write_tokens);
        self.cache_read_tokens = sum(self.cache_read_tokens, other.cache_read_tokens);
    }
}

/// Failure classes shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Checksum or length mismatch in the binary framing
    FrameCorruption,
    /// Event sequence or vocabulary the dialect does not allow
    ProtocolViolation,
    /// Upstream error, message passed through
    Provider,
    /// Upstream throttling; back off and retry
    RateLimited,
    ToolResolution,
    CapabilityUnsupported,
    InvalidRequest,
    Transport,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrameCorruption => "frame_corruption",
            Self::ProtocolViolation => "protocol_violation",
            Self::Provider => "provider",
            Self::RateLimited => "rate_limited",
            Self::ToolResolution => "tool_resolution",
            Self::CapabilityUnsupported => "capability_unsupported",
            Self::InvalidRequest => "invalid_request",
            Self::Transport => "transport",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limits_are_retryable() {
        assert!(ErrorKind::RateLimited.is_retryable());
        for kind in [
            ErrorKind::FrameCorruption,
            ErrorKind::ProtocolViolation,
            ErrorKind::Provider,
            ErrorKind::Transport,
        ] {
            assert!(!kind.is_retryable(), "{kind}");
        }
    }

    #[test]
    fn usage_sums_optional_cache_counts() {
        let mut total = Usage::new(10, 2);
        total.add(&Usage {
            prompt_tokens: 5,
            completion_tokens: 1,
            cache_write_tokens: None,
            cache_read_tokens: Some(4),
        });
        assert_eq!(total.prompt_tokens, 15);
        assert_eq!(total.completion_tokens, 3);
        assert_eq!(total.cache_write_tokens, None);
        assert_eq!(total.cache_read_tokens, Some(4));
    }

    #[test]
    fn usage_sum_saturates() {
        let mut total = Usage::new(u32::MAX - 1, 7);
        total.cache_read_tokens = Some(u32::MAX);
        total.add(&Usage {
            prompt_tokens: 5,
            completion_tokens: 1,
            cache_write_tokens: None,
            cache_read_tokens: Some(1),
        });
        assert_eq!(total.prompt_tokens, u32::MAX);
        assert_eq!(total.completion_tokens, 8);
        assert_eq!(total.cache_read_tokens, Some(u32::MAX));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = StreamEvent::TextDelta {
            message_id: "m1".to_string(),
            delta: "Hi".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "text_delta");
        assert_eq!(value["delta"], "Hi");
    }
}
