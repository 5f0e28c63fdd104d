use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::citation::CitationGroup;
use crate::conversation::{Message, SystemPrompt};
use crate::registry::ToolRegistry;
use crate::stream::{FinishReason, Usage};
use crate::tool::{ToolCall, ToolDefinition, ToolResult};

/// How the model may pick tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    /// Must call some tool
    Any,
    /// Must call this tool
    Tool(String),
}

/// One logical request. The message list is the conversation history and
/// grows as the tool loops append assistant turns and tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    #[serde(default)]
    pub system_prompts: Vec<SystemPrompt>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    /// Upper bound on model round-trips for this request.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Provider-specific settings, forwarded or interpreted by the provider.
    #[serde(default)]
    pub provider_options: Map<String, Value>,
}

fn default_max_steps() -> usize {
    1
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompts: Vec::new(),
            messages: Vec::new(),
            tools: Vec::new(),
            tool_choice: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            max_steps: default_max_steps(),
            provider_options: Map::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompts.push(SystemPrompt::new(prompt));
        self
    }

    pub fn with_system_prompts(mut self, prompts: Vec<SystemPrompt>) -> Self {
        self.system_prompts.extend(prompts);
        self
    }

    /// Append a plain user message.
    pub fn with_prompt(mut self, text: impl Into<String>) -> Self {
        self.messages.push(Message::user(text));
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Advertise every tool in `registry`.
    pub fn with_registry(self, registry: &ToolRegistry) -> Self {
        self.with_tools(registry.definitions())
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_provider_option(mut self, key: &str, value: Value) -> Self {
        self.provider_options.insert(key.to_string(), value);
        self
    }

    pub fn provider_option(&self, key: &str) -> Option<&Value> {
        self.provider_options.get(key).filter(|v| !v.is_null())
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// Identifiers reported by the provider for one response. Either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub id: String,
    pub model: String,
}

/// A single non-streamed model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub finish_reason: FinishReason,
    pub tool_calls: Vec<ToolCall>,
    pub citations: Vec<CitationGroup>,
    pub usage: Usage,
    pub meta: ResponseMeta,
}

/// One round-trip of a [`TextResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub text: String,
    pub finish_reason: FinishReason,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    pub usage: Usage,
    pub meta: ResponseMeta,
}

/// Final result of a non-streamed request. Top-level fields describe the
/// last step; usage is summed over all steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextResponse {
    pub text: String,
    pub finish_reason: FinishReason,
    pub steps: Vec<Step>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    pub usage: Usage,
    pub meta: ResponseMeta,
    /// History including every assistant turn and tool result.
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub text: String,
    pub structured: Value,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub meta: ResponseMeta,
    pub messages: Vec<Message>,
}
