//! Provider-agnostic chat vocabulary and the tool-calling loops built on it.
//!
//! A provider turns a [`ChatRequest`] into one round-trip of [`StreamEvent`]s
//! (or one [`Completion`]). [`ToolLoop`] strings streamed round-trips together,
//! running requested tools between them; [`StepLoop`] does the same for
//! single-shot completions.

pub mod citation;
pub mod conversation;
pub mod provider;
pub mod registry;
pub mod request;
pub mod runtime;
pub mod steps;
pub mod stream;
pub mod tool;

pub use citation::{Citation, CitationGroup, PositionType, TextSegment};
pub use conversation::{CacheType, Media, MediaKind, MediaSource, Message, SystemPrompt};
pub use provider::{EventStream, LlmError, ToolAwareLlmProvider};
pub use registry::{RegistryError, ToolRegistry};
pub use request::{
    ChatRequest, Completion, ResponseMeta, Step, StructuredResponse, TextResponse, ToolChoice,
};
pub use runtime::ToolLoop;
pub use steps::StepLoop;
pub use stream::{ErrorKind, FinishReason, StreamEvent, Usage};
pub use tool::{parse_tool_arguments, FnTool, Tool, ToolCall, ToolDefinition, ToolError, ToolResult};
