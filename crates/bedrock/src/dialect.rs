use std::fmt;

use riverbed_tool_runtime::{ChatRequest, Completion, FinishReason, MediaKind, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::anthropic::{self, AnthropicDecoder};
use crate::converse::{self, ConverseDecoder};
use crate::error::BedrockError;
use crate::payload::PayloadDecoder;

/// Operations and content kinds a dialect may or may not offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Text,
    Structured,
    Stream,
    Citations,
    Documents,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Structured => "structured",
            Self::Stream => "stream",
            Self::Citations => "citations",
            Self::Documents => "documents",
        }
    }
}

/// Wire format of a request and its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Converse,
    Anthropic,
}

const CONVERSE_CAPABILITIES: &[Capability] = &[
    Capability::Text,
    Capability::Structured,
    Capability::Stream,
    Capability::Citations,
    Capability::Documents,
];

const ANTHROPIC_CAPABILITIES: &[Capability] =
    &[Capability::Text, Capability::Structured, Capability::Stream];

impl Dialect {
    pub fn parse(name: &str) -> Result<Self, BedrockError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "converse" => Ok(Self::Converse),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(BedrockError::InvalidRequest(format!(
                "unknown api schema {other:?} (expected \"converse\" or \"anthropic\")"
            ))),
        }
    }

    /// Anthropic model ids use the Anthropic dialect; everything else Converse.
    pub fn from_model(model: &str) -> Self {
        if model.contains("anthropic.") {
            Self::Anthropic
        } else {
            Self::Converse
        }
    }

    /// Pick the dialect for a request: the `apiSchema` provider option, then
    /// the configured default, then the id of the model being called.
    pub fn select(
        request: &ChatRequest,
        configured: Option<&str>,
        model: &str,
    ) -> Result<Self, BedrockError> {
        if let Some(value) = request.provider_option("apiSchema") {
            let name = value.as_str().ok_or_else(|| {
                BedrockError::InvalidRequest("apiSchema must be a string".to_string())
            })?;
            return Self::parse(name);
        }
        match configured {
            Some(name) => Self::parse(name),
            None => Ok(Self::from_model(model)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converse => "converse",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Self::Converse => CONVERSE_CAPABILITIES,
            Self::Anthropic => ANTHROPIC_CAPABILITIES,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    pub fn ensure(&self, capability: Capability) -> Result<(), BedrockError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(BedrockError::Unsupported {
                dialect: self.as_str(),
                capability: capability.as_str(),
            })
        }
    }

    /// Reject content this dialect cannot express, before anything is sent.
    pub fn validate(&self, request: &ChatRequest) -> Result<(), BedrockError> {
        for message in &request.messages {
            match message {
                Message::User { media, .. } => {
                    if media.iter().any(|m| m.kind == MediaKind::Document) {
                        self.ensure(Capability::Documents)?;
                    }
                }
                Message::Assistant { citations, .. } => {
                    if !citations.is_empty() {
                        self.ensure(Capability::Citations)?;
                    }
                }
                Message::ToolResults { .. } => {}
                Message::System(_) => {
                    return Err(BedrockError::InvalidRequest(format!(
                        "{} does not accept system messages in the message list; \
                         use system prompts instead",
                        self.as_str()
                    )))
                }
            }
        }
        Ok(())
    }

    /// Path segment after `/model/{id}/`.
    pub fn endpoint(&self, streaming: bool) -> &'static str {
        match (self, streaming) {
            (Self::Converse, false) => "converse",
            (Self::Converse, true) => "converse-stream",
            (Self::Anthropic, false) => "invoke",
            (Self::Anthropic, true) => "invoke-with-response-stream",
        }
    }

    /// Normalize a wire stop reason. Values outside the dialect's vocabulary
    /// are protocol violations.
    pub fn map_finish_reason(&self, stop_reason: &str) -> Result<FinishReason, BedrockError> {
        let mapped = match self {
            Self::Converse => converse::map_finish_reason(stop_reason),
            Self::Anthropic => anthropic::map_finish_reason(stop_reason),
        };
        mapped.ok_or_else(|| {
            BedrockError::protocol(format!(
                "unknown {} stop reason {stop_reason:?}",
                self.as_str()
            ))
        })
    }

    pub fn build_payload(
        &self,
        request: &ChatRequest,
        step: usize,
        default_max_tokens: u32,
    ) -> Result<Value, BedrockError> {
        match self {
            Self::Converse => converse::build_payload(request, step),
            Self::Anthropic => anthropic::build_payload(request, default_max_tokens),
        }
    }

    pub fn parse_completion(&self, body: Value) -> Result<Completion, BedrockError> {
        match self {
            Self::Converse => converse::parse_completion(body),
            Self::Anthropic => anthropic::parse_completion(body),
        }
    }

    /// A fresh decoder for one streamed response.
    pub fn payload_decoder(&self) -> Box<dyn PayloadDecoder> {
        match self {
            Self::Converse => Box::new(ConverseDecoder::new()),
            Self::Anthropic => Box::new(AnthropicDecoder::new()),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
