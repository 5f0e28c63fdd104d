use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::conversation::CacheType;

/// Describes a tool's interface for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "current_time")
    pub name: String,
    /// Human-readable description for the model
    pub description: String,
    /// JSON Schema for each named parameter
    pub parameters: Map<String, Value>,
    /// Names of the parameters the model must always supply
    pub required: Vec<String>,
    /// Cache breakpoint placed after this tool's spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheType>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Map::new(),
            required: Vec::new(),
            cache: None,
        }
    }

    pub fn with_parameter(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.parameters.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn with_cache(mut self, cache: CacheType) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Object schema assembled from the parameters.
    pub fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": self.parameters,
            "required": self.required,
        })
    }
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this invocation (used to match results)
    pub id: String,
    pub name: String,
    /// Always a JSON object once the call is complete
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of running one [`ToolCall`], sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Matches [`ToolCall::id`]
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: Value,
    /// Tool output; `Null` when the call failed
    pub result: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(call: &ToolCall, result: Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            success: true,
            error: None,
        }
    }

    pub fn failure(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            result: Value::Null,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Text handed back to the model: the output, or the error for failed calls.
    pub fn content_text(&self) -> String {
        if !self.success {
            return self.error.clone().unwrap_or_default();
        }
        match &self.result {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Turn a buffered tool-input string into call arguments.
///
/// A JSON object is used as-is, an empty buffer becomes `{}` and anything
/// else is kept verbatim under an `"input"` key.
pub fn parse_tool_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => json!({ "input": raw }),
    }
}

/// The primary extension point: all tools implement this trait.
///
/// Tools are object-safe, Send + Sync, and async.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with the model-supplied arguments.
    async fn call(&self, arguments: Value) -> Result<Value, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// A tool backed by an async closure.
#[derive(Clone)]
pub struct FnTool {
    definition: ToolDefinition,
    handler: Handler,
}

impl FnTool {
    pub fn new<F, Fut>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            definition,
            handler: Arc::new(move |args| handler(args).boxed()),
        }
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        (self.handler)(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_tool() -> FnTool {
        let def = ToolDefinition::new("weather", "Current weather for a city").with_parameter(
            "city",
            json!({"type": "string", "description": "City name"}),
            true,
        );
        FnTool::new(def, |args: Value| async move {
            let city = args
                .get("city")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidInput("missing 'city'".to_string()))?;
            Ok(Value::String(format!("Sunny in {city}")))
        })
    }

    #[test]
    fn input_schema_is_an_object_schema() {
        let schema = weather_tool().definition().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["city"]["type"], "string");
        assert_eq!(schema["required"], json!(["city"]));
    }

    #[test]
    fn tool_without_parameters_still_has_properties_object() {
        let schema = ToolDefinition::new("noop", "Does nothing").input_schema();
        assert_eq!(schema["properties"], json!({}));
        assert_eq!(schema["required"], json!([]));
    }

    #[test]
    fn split_input_reassembles() {
        let chunks = [r#"{"city":"#, r#""Detroit"}"#];
        assert_eq!(parse_tool_arguments(&chunks.concat()), json!({"city": "Detroit"}));

        let full = r#"{"city":"Detroit"}"#;
        for split in 1..full.len() {
            let (a, b) = full.split_at(split);
            let mut buffer = String::new();
            buffer.push_str(a);
            buffer.push_str(b);
            assert_eq!(parse_tool_arguments(&buffer), json!({"city": "Detroit"}));
        }
    }

    #[test]
    fn empty_input_is_empty_object() {
        assert_eq!(parse_tool_arguments(""), json!({}));
        assert_eq!(parse_tool_arguments("  "), json!({}));
    }

    #[test]
    fn non_json_input_is_wrapped() {
        assert_eq!(parse_tool_arguments("foo"), json!({"input": "foo"}));
        assert_eq!(parse_tool_arguments(r#"{"city":"#), json!({"input": r#"{"city":"#}));
        assert_eq!(parse_tool_arguments("42"), json!({"input": "42"}));
    }

    #[tokio::test]
    async fn fn_tool_runs_handler() {
        let tool = weather_tool();
        let out = tool.call(json!({"city": "Oslo"})).await.unwrap();
        assert_eq!(out, json!("Sunny in Oslo"));

        let err = tool.call(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn content_text_prefers_error_for_failures() {
        let call = ToolCall::new("t1", "weather", json!({"city": "Oslo"}));
        assert_eq!(ToolResult::success(&call, json!("ok")).content_text(), "ok");
        assert_eq!(
            ToolResult::success(&call, json!({"temp": 3})).content_text(),
            r#"{"temp":3}"#
        );

        let failed = ToolResult::failure(&call, "boom");
        assert!(!failed.success);
        assert_eq!(failed.result, Value::Null);
        assert_eq!(failed.content_text(), "boom");
    }
}
