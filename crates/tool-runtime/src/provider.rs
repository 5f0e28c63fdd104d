use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::request::{ChatRequest, Completion};
use crate::stream::{ErrorKind, StreamEvent};

/// Events of one streamed round-trip. A failure mid-stream arrives as a
/// final [`StreamEvent::Error`] rather than a `Result`.
pub type EventStream = BoxStream<'static, StreamEvent>;

/// Trait for chat providers that support tool use and streaming.
///
/// This trait lives in tool-runtime because it's defined by the consumer
/// (the tool loops), not the provider.
#[async_trait]
pub trait ToolAwareLlmProvider: Send + Sync {
    /// Send one request and stream back its events. `step` counts the
    /// round-trips already made for this logical request, starting at 0.
    async fn stream_round_trip(
        &self,
        request: &ChatRequest,
        step: usize,
    ) -> Result<EventStream, LlmError>;

    /// Send one request and wait for the whole response.
    async fn complete(&self, request: &ChatRequest, step: usize) -> Result<Completion, LlmError>;

    /// Provider name for logging/debugging (e.g., "bedrock")
    fn provider_name(&self) -> &str;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("Frame corruption: {0}")]
    FrameCorruption(String),
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Capability not supported: {0}")]
    CapabilityUnsupported(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FrameCorruption(_) => ErrorKind::FrameCorruption,
            Self::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            Self::Provider(_) | Self::InvalidResponse(_) => ErrorKind::Provider,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::CapabilityUnsupported(_) => ErrorKind::CapabilityUnsupported,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Rebuild an error from a streamed [`StreamEvent::Error`].
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::FrameCorruption => Self::FrameCorruption(message),
            ErrorKind::ProtocolViolation => Self::ProtocolViolation(message),
            ErrorKind::Provider | ErrorKind::ToolResolution => Self::Provider(message),
            ErrorKind::RateLimited => Self::RateLimited(message),
            ErrorKind::CapabilityUnsupported => Self::CapabilityUnsupported(message),
            ErrorKind::InvalidRequest => Self::InvalidRequest(message),
            ErrorKind::Transport => Self::Transport(message),
        }
    }

    /// The terminal stream event for this error.
    pub fn into_event(self) -> StreamEvent {
        let kind = self.kind();
        StreamEvent::error(kind, self.to_string())
    }
}

/// Mock provider for testing the tool loops without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::{Mutex, MutexGuard};

    use futures::stream::{self, StreamExt};
    use serde_json::Value;

    use super::*;
    use crate::request::ResponseMeta;
    use crate::stream::{FinishReason, Usage};
    use crate::tool::ToolCall;

    enum Reply<T> {
        Ok(T),
        Err(LlmError),
    }

    /// Returns pre-configured round-trips in FIFO order and records every
    /// request it receives together with its step number.
    #[derive(Default)]
    pub struct MockProvider {
        round_trips: Mutex<VecDeque<Reply<Vec<StreamEvent>>>>,
        completions: Mutex<VecDeque<Reply<Completion>>>,
        repeat: Mutex<Option<Vec<StreamEvent>>>,
        requests: Mutex<Vec<(usize, ChatRequest)>>,
    }

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(|e| e.into_inner())
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the events of the next streamed round-trip.
        pub fn queue_round_trip(&self, events: Vec<StreamEvent>) {
            lock(&self.round_trips).push_back(Reply::Ok(events));
        }

        /// Make the next streamed round-trip fail before any event.
        pub fn queue_round_trip_error(&self, error: LlmError) {
            lock(&self.round_trips).push_back(Reply::Err(error));
        }

        /// Serve these events whenever the queue is empty.
        pub fn repeat_round_trip(&self, events: Vec<StreamEvent>) {
            *lock(&self.repeat) = Some(events);
        }

        pub fn queue_completion(&self, completion: Completion) {
            lock(&self.completions).push_back(Reply::Ok(completion));
        }

        pub fn queue_completion_error(&self, error: LlmError) {
            lock(&self.completions).push_back(Reply::Err(error));
        }

        /// Requests received so far, with the step each was sent at.
        pub fn requests(&self) -> Vec<(usize, ChatRequest)> {
            lock(&self.requests).clone()
        }

        pub fn request_count(&self) -> usize {
            lock(&self.requests).len()
        }

        /// Events of a plain text answer.
        pub fn text_round_trip(message_id: &str, text: &str) -> Vec<StreamEvent> {
            let id = message_id.to_string();
            vec![
                StreamEvent::StreamStart {
                    message_id: id.clone(),
                    model: "mock-model".to_string(),
                },
                StreamEvent::TextStart {
                    message_id: id.clone(),
                },
                StreamEvent::TextDelta {
                    message_id: id.clone(),
                    delta: text.to_string(),
                },
                StreamEvent::TextComplete { message_id: id },
                StreamEvent::StreamEnd {
                    finish_reason: FinishReason::Stop,
                    usage: Usage::new(10, 2),
                    citations: Vec::new(),
                },
            ]
        }

        /// Events of a round-trip that requests the given tool calls.
        pub fn tool_round_trip(message_id: &str, calls: Vec<ToolCall>) -> Vec<StreamEvent> {
            let id = message_id.to_string();
            let mut events = vec![StreamEvent::StreamStart {
                message_id: id.clone(),
                model: "mock-model".to_string(),
            }];
            events.extend(calls.into_iter().map(|tool_call| StreamEvent::ToolCall {
                message_id: id.clone(),
                tool_call,
            }));
            events.push(StreamEvent::StreamEnd {
                finish_reason: FinishReason::ToolCalls,
                usage: Usage::new(10, 5),
                citations: Vec::new(),
            });
            events
        }

        pub fn text_completion(text: &str) -> Completion {
            Completion {
                text: text.to_string(),
                finish_reason: FinishReason::Stop,
                tool_calls: Vec::new(),
                citations: Vec::new(),
                usage: Usage::new(10, 2),
                meta: ResponseMeta::default(),
            }
        }

        pub fn tool_completion(calls: Vec<ToolCall>) -> Completion {
            Completion {
                text: String::new(),
                finish_reason: FinishReason::ToolCalls,
                tool_calls: calls,
                citations: Vec::new(),
                usage: Usage::new(10, 5),
                meta: ResponseMeta::default(),
            }
        }

        pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
            ToolCall::new(id, name, arguments)
        }
    }

    #[async_trait]
    impl ToolAwareLlmProvider for MockProvider {
        async fn stream_round_trip(
            &self,
            request: &ChatRequest,
            step: usize,
        ) -> Result<EventStream, LlmError> {
            lock(&self.requests).push((step, request.clone()));
            let next = lock(&self.round_trips).pop_front();
            let events = match next {
                Some(Reply::Ok(events)) => events,
                Some(Reply::Err(e)) => return Err(e),
                None => lock(&self.repeat)
                    .clone()
                    .unwrap_or_else(|| Self::text_round_trip("mock-msg", "")),
            };
            Ok(stream::iter(events).boxed())
        }

        async fn complete(&self, request: &ChatRequest, step: usize) -> Result<Completion, LlmError> {
            lock(&self.requests).push((step, request.clone()));
            match lock(&self.completions).pop_front() {
                Some(Reply::Ok(completion)) => Ok(completion),
                Some(Reply::Err(e)) => Err(e),
                None => Ok(Self::text_completion("")),
            }
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }
}
