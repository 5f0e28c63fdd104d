//! Built-in tools offered to the model.

use anyhow::Result;
use chrono::Utc;
use riverbed_tool_runtime::{FnTool, ToolDefinition, ToolError, ToolRegistry};
use serde_json::{json, Value};

pub fn registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(current_time())?;
    registry.register(word_count())?;
    Ok(registry)
}

fn current_time() -> FnTool {
    let def = ToolDefinition::new("current_time", "Current date and time in UTC");
    FnTool::new(def, |_args: Value| async move {
        let now = Utc::now();
        Ok(json!({
            "utc": now.to_rfc3339(),
            "unix": now.timestamp(),
        }))
    })
}

fn word_count() -> FnTool {
    let def = ToolDefinition::new("word_count", "Count the words and characters in a text")
        .with_parameter(
            "text",
            json!({"type": "string", "description": "Text to count"}),
            true,
        );
    FnTool::new(def, |args: Value| async move {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("missing 'text'".to_string()))?;
        Ok(json!({
            "words": text.split_whitespace().count(),
            "characters": text.chars().count(),
        }))
    })
}

#[cfg(test)]
mod tests {
    use riverbed_tool_runtime::ToolCall;

    use super::*;

    #[tokio::test]
    async fn word_count_counts() {
        let registry = registry().unwrap();
        let call = ToolCall::new("t1", "word_count", json!({"text": "the quick  brown fox"}));

        let result = registry.execute(&call).await;

        assert!(result.success);
        assert_eq!(result.result, json!({"words": 4, "characters": 20}));
    }

    #[tokio::test]
    async fn word_count_requires_text() {
        let registry = registry().unwrap();
        let result = registry
            .execute(&ToolCall::new("t1", "word_count", json!({})))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("text"));
    }

    #[tokio::test]
    async fn current_time_reports_utc() {
        let registry = registry().unwrap();
        let result = registry
            .execute(&ToolCall::new("t1", "current_time", json!({})))
            .await;
        assert!(result.success);
        assert!(result.result["utc"].as_str().unwrap().ends_with("+00:00"));
    }

    #[test]
    fn definitions_are_advertised_in_order() {
        let names: Vec<String> = registry()
            .unwrap()
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["current_time", "word_count"]);
    }
}
