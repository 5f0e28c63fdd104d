use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, info, warn};

use crate::citation::CitationGroup;
use crate::conversation::Message;
use crate::provider::{EventStream, ToolAwareLlmProvider};
use crate::registry::ToolRegistry;
use crate::request::ChatRequest;
use crate::stream::{FinishReason, StreamEvent};
use crate::tool::{ToolCall, ToolResult};

/// What one round-trip produced, gathered from its events.
#[derive(Debug, Default)]
struct TurnAccumulator {
    message_id: String,
    text: String,
    tool_calls: Vec<ToolCall>,
    citations: Vec<CitationGroup>,
    finish_reason: Option<FinishReason>,
    errored: bool,
}

impl TurnAccumulator {
    fn observe(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::StreamStart { message_id, .. } => self.message_id = message_id.clone(),
            StreamEvent::TextDelta { delta, .. } => self.text.push_str(delta),
            StreamEvent::ToolCall { tool_call, .. } => self.tool_calls.push(tool_call.clone()),
            StreamEvent::StreamEnd {
                finish_reason,
                citations,
                ..
            } => {
                self.finish_reason = Some(*finish_reason);
                self.citations = citations.clone();
            }
            StreamEvent::Error { .. } => self.errored = true,
            _ => {}
        }
    }
}

/// A finished round-trip asks for another one exactly when it produced tool
/// calls. The reported finish reason does not matter.
pub(crate) fn requests_tools(tool_calls: &[ToolCall]) -> bool {
    !tool_calls.is_empty()
}

enum Phase {
    /// Next pull sends a request.
    Request,
    Streaming(EventStream),
    /// Tool calls of the finished round-trip, run one per pull.
    RunningTools {
        calls: VecDeque<ToolCall>,
        results: Vec<ToolResult>,
    },
    Done,
}

/// Drives streamed round-trips and tool execution as one flat event sequence.
///
/// Flow: request → events → tool calls → run tools → append history →
/// request again, until the model stops asking for tools or `max_steps`
/// round-trips have been made. Nothing runs between pulls, so dropping the
/// loop stops all work.
pub struct ToolLoop {
    provider: Arc<dyn ToolAwareLlmProvider>,
    registry: Arc<ToolRegistry>,
    request: ChatRequest,
    /// Round-trips completed so far. Never decreases.
    depth: usize,
    phase: Phase,
    turn: TurnAccumulator,
}

impl ToolLoop {
    pub fn new(
        provider: Arc<dyn ToolAwareLlmProvider>,
        registry: Arc<ToolRegistry>,
        request: ChatRequest,
    ) -> Self {
        Self {
            provider,
            registry,
            request,
            depth: 0,
            phase: Phase::Request,
            turn: TurnAccumulator::default(),
        }
    }

    /// The request as it stands, including appended history.
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    pub fn into_request(self) -> ChatRequest {
        self.request
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pull the next event. `None` once the sequence has ended, either
    /// cleanly or after an [`StreamEvent::Error`].
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Done => return None,

                Phase::Request => {
                    debug!(
                        provider = self.provider.provider_name(),
                        depth = self.depth,
                        model = %self.request.model,
                        "Starting round-trip"
                    );
                    self.turn = TurnAccumulator::default();
                    match self
                        .provider
                        .stream_round_trip(&self.request, self.depth)
                        .await
                    {
                        Ok(events) => self.phase = Phase::Streaming(events),
                        Err(e) => {
                            warn!(depth = self.depth, error = %e, "Round-trip failed to start");
                            return Some(e.into_event());
                        }
                    }
                }

                Phase::Streaming(mut events) => match events.next().await {
                    Some(event) => {
                        self.turn.observe(&event);
                        if !event.is_terminal_error() {
                            self.phase = Phase::Streaming(events);
                        }
                        return Some(event);
                    }
                    None => self.end_round_trip(),
                },

                Phase::RunningTools { mut calls, mut results } => match calls.pop_front() {
                    Some(call) => {
                        let result = self.registry.execute(&call).await;
                        results.push(result.clone());
                        self.phase = Phase::RunningTools { calls, results };
                        return Some(StreamEvent::ToolResult {
                            message_id: self.turn.message_id.clone(),
                            result,
                        });
                    }
                    None => self.continue_after_tools(results),
                },
            }
        }
    }

    /// Consume the loop as a stream of events.
    pub fn into_stream(self) -> BoxStream<'static, StreamEvent> {
        stream::unfold(self, |mut tool_loop| async move {
            let event = tool_loop.next_event().await?;
            Some((event, tool_loop))
        })
        .boxed()
    }

    fn end_round_trip(&mut self) {
        if self.turn.errored {
            return;
        }

        if !requests_tools(&self.turn.tool_calls) {
            info!(
                depth = self.depth,
                finish_reason = ?self.turn.finish_reason,
                "Tool loop complete"
            );
            let turn = std::mem::take(&mut self.turn);
            self.request.push_message(Message::assistant_turn(
                turn.text,
                Vec::new(),
                turn.citations,
            ));
            self.depth += 1;
            return;
        }

        info!(
            depth = self.depth,
            count = self.turn.tool_calls.len(),
            "Executing tool calls"
        );
        self.phase = Phase::RunningTools {
            calls: self.turn.tool_calls.iter().cloned().collect(),
            results: Vec::new(),
        };
    }

    fn continue_after_tools(&mut self, results: Vec<ToolResult>) {
        let text = std::mem::take(&mut self.turn.text);
        let calls = std::mem::take(&mut self.turn.tool_calls);
        let citations = std::mem::take(&mut self.turn.citations);
        self.request
            .push_message(Message::assistant_turn(text, calls, citations));
        self.request.push_message(Message::tool_results(results));

        self.depth += 1;
        if self.depth < self.request.max_steps {
            self.phase = Phase::Request;
        } else {
            info!(depth = self.depth, "Step limit reached, stopping tool loop");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::provider::mock::MockProvider;
    use crate::provider::LlmError;
    use crate::stream::ErrorKind;
    use crate::tool::{FnTool, ToolDefinition, ToolError};

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
        registry
            .register(FnTool::new(
                ToolDefinition::new("explode", "Always fails"),
                |_| async { Err(ToolError::ExecutionFailed("kaboom".to_string())) },
            ))
            .unwrap();
        Arc::new(registry)
    }

    fn weather_call(id: &str) -> ToolCall {
        ToolCall::new(id, "weather", json!({"city": "Detroit"}))
    }

    async fn drain(tool_loop: &mut ToolLoop) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = tool_loop.next_event().await {
            events.push(event);
        }
        events
    }

    fn tool_results(events: &[StreamEvent]) -> Vec<&ToolResult> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolResult { result, .. } => Some(result),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn plain_answer_is_one_round_trip() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_round_trip(MockProvider::text_round_trip("m1", "Hello!"));

        let request = ChatRequest::new("mock").with_prompt("Hi").with_max_steps(5);
        let mut tool_loop = ToolLoop::new(provider.clone(), registry(), request);
        let events = drain(&mut tool_loop).await;

        assert_eq!(events, MockProvider::text_round_trip("m1", "Hello!"));
        assert_eq!(provider.request_count(), 1);
        let history = &tool_loop.request().messages;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], Message::assistant("Hello!"));
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_round_trip(MockProvider::tool_round_trip("m1", vec![weather_call("t1")]));
        provider.queue_round_trip(MockProvider::text_round_trip("m2", "It is sunny."));

        let request = ChatRequest::new("mock").with_prompt("Weather?").with_max_steps(3);
        let mut tool_loop = ToolLoop::new(provider.clone(), registry(), request);
        let events = drain(&mut tool_loop).await;

        let results = tool_results(&events);
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].result, json!("Sunny in Detroit"));

        // Tool result comes after the first round-trip's StreamEnd and before the second StreamStart.
        let first_end = events
            .iter()
            .position(|e| matches!(e, StreamEvent::StreamEnd { .. }))
            .unwrap();
        let result_at = events
            .iter()
            .position(|e| matches!(e, StreamEvent::ToolResult { .. }))
            .unwrap();
        let second_start = events
            .iter()
            .rposition(|e| matches!(e, StreamEvent::StreamStart { .. }))
            .unwrap();
        assert!(first_end < result_at && result_at < second_start);

        let requests = provider.requests();
        assert_eq!(requests.iter().map(|(step, _)| *step).collect::<Vec<_>>(), vec![0, 1]);
        let follow_up = &requests[1].1.messages;
        assert_eq!(follow_up.len(), 3);
        assert!(matches!(&follow_up[1], Message::Assistant { tool_calls, .. } if tool_calls.len() == 1));
        assert!(matches!(&follow_up[2], Message::ToolResults { results } if results[0].tool_call_id == "t1"));

        assert_eq!(tool_loop.request().messages.len(), 4);
        assert_eq!(tool_loop.depth(), 2);
    }

    #[tokio::test]
    async fn step_limit_stops_a_model_that_always_wants_tools() {
        let provider = Arc::new(MockProvider::new());
        provider.repeat_round_trip(MockProvider::tool_round_trip("m", vec![weather_call("t")]));

        let request = ChatRequest::new("mock").with_prompt("loop").with_max_steps(2);
        let mut tool_loop = ToolLoop::new(provider.clone(), registry(), request);
        let events = drain(&mut tool_loop).await;

        assert_eq!(provider.request_count(), 2);
        assert!(events.iter().all(|e| !e.is_terminal_error()));
        assert_eq!(tool_results(&events).len(), 2);

        let history = &tool_loop.request().messages;
        assert!(matches!(history.last(), Some(Message::ToolResults { .. })));
        assert_eq!(tool_loop.depth(), 2);
    }

    #[tokio::test]
    async fn tool_finish_without_calls_ends_the_loop() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_round_trip(MockProvider::tool_round_trip("m1", Vec::new()));

        let request = ChatRequest::new("mock").with_prompt("go").with_max_steps(3);
        let mut tool_loop = ToolLoop::new(provider.clone(), registry(), request);
        let events = drain(&mut tool_loop).await;

        assert_eq!(provider.request_count(), 1);
        assert!(tool_results(&events).is_empty());
        assert_eq!(tool_loop.depth(), 1);
    }

    #[tokio::test]
    async fn tool_calls_continue_even_with_a_stop_reason() {
        let provider = Arc::new(MockProvider::new());
        let mut events = MockProvider::tool_round_trip("m1", vec![weather_call("t1")]);
        if let Some(StreamEvent::StreamEnd { finish_reason, .. }) = events.last_mut() {
            *finish_reason = FinishReason::Stop;
        }
        provider.queue_round_trip(events);
        provider.queue_round_trip(MockProvider::text_round_trip("m2", "Sunny"));

        let request = ChatRequest::new("mock").with_prompt("go").with_max_steps(3);
        let mut tool_loop = ToolLoop::new(provider.clone(), registry(), request);
        let events = drain(&mut tool_loop).await;

        assert_eq!(provider.request_count(), 2);
        assert_eq!(tool_results(&events).len(), 1);
    }

    #[tokio::test]
    async fn failing_and_unknown_tools_do_not_abort_the_batch() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_round_trip(MockProvider::tool_round_trip(
            "m1",
            vec![
                ToolCall::new("a", "explode", json!({})),
                ToolCall::new("b", "teleport", json!({})),
                weather_call("c"),
            ],
        ));
        provider.queue_round_trip(MockProvider::text_round_trip("m2", "done"));

        let request = ChatRequest::new("mock").with_prompt("go").with_max_steps(2);
        let mut tool_loop = ToolLoop::new(provider.clone(), registry(), request);
        let events = drain(&mut tool_loop).await;

        let results = tool_results(&events);
        let ids: Vec<&str> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(results[0].error.as_deref(), Some("Execution failed: kaboom"));
        assert_eq!(results[1].error.as_deref(), Some("Tool 'teleport' is not registered"));
        assert!(results[2].success);
        assert_eq!(provider.request_count(), 2);

        let follow_up = &provider.requests()[1].1.messages;
        assert!(matches!(&follow_up[2], Message::ToolResults { results } if results.len() == 3));
    }

    #[tokio::test]
    async fn error_event_ends_the_sequence_without_running_tools() {
        let provider = Arc::new(MockProvider::new());
        let mut events = MockProvider::tool_round_trip("m1", vec![weather_call("t1")]);
        events.pop();
        events.push(StreamEvent::error(ErrorKind::RateLimited, "Too many requests"));
        events.push(StreamEvent::TextDelta {
            message_id: "m1".to_string(),
            delta: "never seen".to_string(),
        });
        provider.queue_round_trip(events);

        let request = ChatRequest::new("mock").with_prompt("go").with_max_steps(3);
        let mut tool_loop = ToolLoop::new(provider.clone(), registry(), request);
        let seen = drain(&mut tool_loop).await;

        assert!(matches!(
            seen.last(),
            Some(StreamEvent::Error { kind: ErrorKind::RateLimited, .. })
        ));
        assert!(tool_results(&seen).is_empty());
        assert_eq!(provider.request_count(), 1);
        assert_eq!(tool_loop.request().messages.len(), 1);
    }

    #[tokio::test]
    async fn failure_to_start_is_a_terminal_error_event() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_round_trip_error(LlmError::CapabilityUnsupported(
            "documents are not supported".to_string(),
        ));

        let tool_loop = ToolLoop::new(provider, registry(), ChatRequest::new("mock"));
        let events: Vec<StreamEvent> = tool_loop.into_stream().collect().await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            StreamEvent::Error { kind: ErrorKind::CapabilityUnsupported, message }
                if message.contains("documents")
        ));
    }

    #[tokio::test]
    async fn stream_adapter_yields_the_same_events() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_round_trip(MockProvider::tool_round_trip("m1", vec![weather_call("t1")]));
        provider.queue_round_trip(MockProvider::text_round_trip("m2", "ok"));

        let request = ChatRequest::new("mock").with_max_steps(2);
        let events: Vec<StreamEvent> = ToolLoop::new(provider, registry(), request)
            .into_stream()
            .collect()
            .await;

        assert_eq!(events.len(), 3 + 1 + 5);
        assert!(matches!(events.last(), Some(StreamEvent::StreamEnd { finish_reason: FinishReason::Stop, .. })));
    }
}
