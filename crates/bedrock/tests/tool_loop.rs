//! Tool loops driven through the Bedrock provider against scripted responses.

mod common;

use std::sync::Arc;

use futures::StreamExt;
use riverbed_tool_runtime::{
    ChatRequest, FinishReason, FnTool, Message, StreamEvent, ToolChoice, ToolDefinition,
    ToolRegistry,
};
use serde_json::{json, Value};

use common::*;

const MODEL: &str = "us.amazon.nova-micro-v1:0";

fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    let weather = ToolDefinition::new("weather", "Weather for a city").with_parameter(
        "city",
        json!({"type": "string"}),
        true,
    );
    registry
        .register(FnTool::new(weather, |args: Value| async move {
            let city = args["city"].as_str().unwrap_or("nowhere").to_string();
            Ok(json!(format!("Sunny in {city}")))
        }))
        .unwrap();
    Arc::new(registry)
}

fn request(registry: &ToolRegistry, max_steps: usize) -> ChatRequest {
    ChatRequest::new(MODEL)
        .with_prompt("What is the weather in Detroit?")
        .with_registry(registry)
        .with_tool_choice(ToolChoice::Auto)
        .with_max_steps(max_steps)
}

fn converse_tool_response(id: &str) -> Value {
    json!({
        "output": {"message": {"role": "assistant", "content": [
            {"toolUse": {"toolUseId": id, "name": "weather", "input": {"city": "Detroit"}}}
        ]}},
        "stopReason": "tool_use",
        "usage": {"inputTokens": 20, "outputTokens": 5, "totalTokens": 25}
    })
}

#[tokio::test]
async fn step_limit_stops_a_model_that_always_calls_tools() {
    let transport = ScriptedTransport::new(vec![
        Reply::Buffered(tool_stream("t1", "weather", &["{\"city\":", "\"Detroit\"}"])),
        Reply::Chunked(tool_stream("t2", "weather", &["{\"city\":\"Detroit\"}"]), 11),
        Reply::Buffered(hi_stream()),
    ]);
    let provider = provider(transport.clone());
    let registry = registry();

    let mut tool_loop = provider.stream(request(&registry, 2), registry.clone());
    let mut events = Vec::new();
    while let Some(event) = tool_loop.next_event().await {
        events.push(event);
    }

    assert_eq!(transport.requests().len(), 2);
    assert!(!events.iter().any(StreamEvent::is_terminal_error));

    let results: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolResult { result, .. } => Some(result.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].tool_call_id, "t2");
    assert_eq!(results[1].result, json!("Sunny in Detroit"));

    // The last result is in history with nothing after it.
    let history = &tool_loop.request().messages;
    assert_eq!(history.len(), 5);
    match history.last() {
        Some(Message::ToolResults { results }) => assert_eq!(results[0].tool_call_id, "t2"),
        other => panic!("expected tool results last, got {other:?}"),
    }
}

#[tokio::test]
async fn follow_up_request_carries_the_tool_round_trip() {
    let transport = ScriptedTransport::new(vec![
        Reply::Buffered(tool_stream("t1", "weather", &["{\"city\":\"Detroit\"}"])),
        Reply::Buffered(hi_stream()),
    ]);
    let provider = provider(transport.clone());
    let registry = registry();

    let events: Vec<StreamEvent> = provider
        .stream(request(&registry, 3), registry.clone())
        .into_stream()
        .collect()
        .await;

    assert!(matches!(
        events.last(),
        Some(StreamEvent::StreamEnd {
            finish_reason: FinishReason::Stop,
            ..
        })
    ));

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].body["toolConfig"].get("toolChoice").is_some());
    assert!(requests[1].body["toolConfig"].get("toolChoice").is_none());

    let messages = requests[1].body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"][0]["toolUse"]["toolUseId"], "t1");
    assert_eq!(messages[2]["role"], "user");
    let tool_result = &messages[2]["content"][0]["toolResult"];
    assert_eq!(tool_result["toolUseId"], "t1");
    assert_eq!(tool_result["status"], "success");
    assert_eq!(tool_result["content"][0]["text"], "Sunny in Detroit");
}

#[tokio::test]
async fn unknown_tool_becomes_a_failed_result() {
    let transport = ScriptedTransport::new(vec![
        Reply::Buffered(tool_stream("t1", "teleport", &["{}"])),
        Reply::Buffered(hi_stream()),
    ]);
    let provider = provider(transport.clone());
    let registry = registry();

    let events: Vec<StreamEvent> = provider
        .stream(request(&registry, 2), registry.clone())
        .into_stream()
        .collect()
        .await;

    let failed = events.iter().find_map(|e| match e {
        StreamEvent::ToolResult { result, .. } => Some(result.clone()),
        _ => None,
    });
    let failed = failed.expect("a tool result");
    assert!(!failed.success);
    assert!(failed.error.unwrap_or_default().contains("teleport"));
    assert!(!events.iter().any(StreamEvent::is_terminal_error));

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].body["messages"][2]["content"][0]["toolResult"]["status"],
        "error"
    );
}

#[tokio::test]
async fn mid_stream_error_ends_the_loop() {
    let transport = ScriptedTransport::new(vec![Reply::Buffered(body(&[
        message_start(),
        exception("throttlingException", "Rate exceeded"),
    ]))]);
    let provider = provider(transport.clone());
    let registry = registry();

    let events: Vec<StreamEvent> = provider
        .stream(request(&registry, 5), registry.clone())
        .into_stream()
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(events[1].is_terminal_error());
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn non_streamed_loop_respects_the_step_limit() {
    let transport = ScriptedTransport::new(vec![
        Reply::Json(converse_tool_response("t1")),
        Reply::Json(converse_tool_response("t2")),
    ]);
    let provider = provider(transport.clone());
    let registry = registry();

    let response = provider
        .text(request(&registry, 2), registry.clone())
        .await
        .unwrap();

    assert_eq!(response.steps.len(), 2);
    assert_eq!(response.finish_reason, FinishReason::ToolCalls);
    assert_eq!(response.usage.prompt_tokens, 40);
    assert_eq!(response.tool_results.len(), 1);
    assert_eq!(response.tool_results[0].tool_call_id, "t2");

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].url.ends_with("/converse"));
}
