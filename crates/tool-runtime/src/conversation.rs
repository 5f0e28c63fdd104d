use serde::{Deserialize, Serialize};

use crate::citation::CitationGroup;
use crate::tool::{ToolCall, ToolResult};

/// Prompt-cache breakpoint marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    Default,
    Ephemeral,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Ephemeral => "ephemeral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheType>,
}

impl SystemPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: CacheType) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    /// Raw content, base64-encoded.
    Base64(String),
    /// Remote content. Providers that need inline bytes reject it.
    Url(String),
}

/// An image or document attached to a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub kind: MediaKind,
    pub mime_type: String,
    pub source: MediaSource,
    /// Document name shown to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Media {
    pub fn image(mime_type: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            mime_type: mime_type.into(),
            source: MediaSource::Base64(base64.into()),
            title: None,
        }
    }

    pub fn document(
        mime_type: impl Into<String>,
        base64: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            kind: MediaKind::Document,
            mime_type: mime_type.into(),
            source: MediaSource::Base64(base64.into()),
            title: Some(title.into()),
        }
    }

    pub fn image_url(mime_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            mime_type: mime_type.into(),
            source: MediaSource::Url(url.into()),
            title: None,
        }
    }
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        text: String,
        #[serde(default)]
        media: Vec<Media>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache: Option<CacheType>,
    },
    /// Assistant's response (may contain text and/or tool calls)
    Assistant {
        text: String,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
        #[serde(default)]
        citations: Vec<CitationGroup>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache: Option<CacheType>,
    },
    /// Results for every tool call of the preceding assistant message, in call order
    ToolResults { results: Vec<ToolResult> },
    /// Only valid as a request's system prompt; providers reject it inside the history.
    System(SystemPrompt),
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            text: text.into(),
            media: Vec::new(),
            cache: None,
        }
    }

    pub fn user_with_media(text: impl Into<String>, media: Vec<Media>) -> Self {
        Self::User {
            text: text.into(),
            media,
            cache: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            text: text.into(),
            tool_calls: Vec::new(),
            citations: Vec::new(),
            cache: None,
        }
    }

    pub fn assistant_turn(
        text: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        citations: Vec<CitationGroup>,
    ) -> Self {
        Self::Assistant {
            text: text.into(),
            tool_calls,
            citations,
            cache: None,
        }
    }

    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self::ToolResults { results }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } | Self::ToolResults { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::System(_) => "system",
        }
    }

    /// Mark this message as a cache breakpoint. No effect on tool results or system messages.
    pub fn with_cache(mut self, marker: CacheType) -> Self {
        match &mut self {
            Self::User { cache, .. } | Self::Assistant { cache, .. } => *cache = Some(marker),
            Self::ToolResults { .. } | Self::System(_) => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn tool_results_are_sent_as_user_role() {
        assert_eq!(Message::tool_results(Vec::new()).role(), "user");
        assert_eq!(Message::assistant("hi").role(), "assistant");
    }

    #[test]
    fn serializes_with_role_tag() {
        let msg = Message::user("hello").with_cache(CacheType::Ephemeral);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["cache"], "ephemeral");

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn assistant_turn_keeps_calls_in_order() {
        let calls = vec![
            ToolCall::new("a", "first", json!({})),
            ToolCall::new("b", "second", json!({})),
        ];
        let Message::Assistant { tool_calls, .. } = Message::assistant_turn("", calls, Vec::new())
        else {
            panic!("expected assistant message");
        };
        assert_eq!(tool_calls[0].id, "a");
        assert_eq!(tool_calls[1].id, "b");
    }
}
