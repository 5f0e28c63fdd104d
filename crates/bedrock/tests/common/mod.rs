//! Shared fixtures for the provider integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use riverbed_bedrock::{BedrockError, BedrockProvider, HttpRequest, Transport};
use riverbed_core::{BedrockConfig, SequentialIds};
use riverbed_eventstream::{event_frame, exception_frame, FrameSource};
use serde_json::{json, Value};

pub enum Reply {
    Json(Value),
    /// Whole body handed over at once.
    Buffered(Bytes),
    /// Body delivered in chunks of the given size.
    Chunked(Bytes, usize),
    Status(u16, String),
}

/// In-memory [`Transport`] that answers from a queue and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &HttpRequest) -> Result<Reply, BedrockError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BedrockError::Transport("no scripted reply left".to_string()))?;
        match reply {
            Reply::Status(status, message) => Err(BedrockError::Http { status, message }),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_json(&self, request: &HttpRequest) -> Result<Value, BedrockError> {
        match self.next(request)? {
            Reply::Json(body) => Ok(body),
            _ => Err(BedrockError::Transport("expected a JSON reply".to_string())),
        }
    }

    async fn send_stream(&self, request: &HttpRequest) -> Result<FrameSource, BedrockError> {
        match self.next(request)? {
            Reply::Buffered(bytes) => Ok(FrameSource::Buffered(bytes)),
            Reply::Chunked(bytes, size) => Ok(chunked(bytes, size)),
            _ => Err(BedrockError::Transport("expected a stream reply".to_string())),
        }
    }
}

pub fn chunked(bytes: Bytes, size: usize) -> FrameSource {
    let chunks: Vec<Result<Bytes, io::Error>> = bytes
        .chunks(size.max(1))
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    FrameSource::Streaming(stream::iter(chunks).boxed())
}

/// Provider over `transport` with deterministic ids `id-1`, `id-2`, ...
pub fn provider(transport: Arc<ScriptedTransport>) -> Arc<BedrockProvider> {
    let config = BedrockConfig {
        endpoint_url: Some("http://bedrock.test".to_string()),
        ..Default::default()
    };
    Arc::new(
        BedrockProvider::new(config)
            .unwrap()
            .with_transport(transport)
            .with_ids(Arc::new(SequentialIds::new("id"))),
    )
}

pub fn body(frames: &[Bytes]) -> Bytes {
    frames.concat().into()
}

// ---------------------------------------------------------------------------
// Converse frames
// ---------------------------------------------------------------------------

pub fn converse(event_type: &str, payload: Value) -> Bytes {
    event_frame(event_type, payload.to_string().as_bytes()).unwrap()
}

pub fn message_start() -> Bytes {
    converse("messageStart", json!({"role": "assistant"}))
}

pub fn text_start(index: u64) -> Bytes {
    converse(
        "contentBlockStart",
        json!({"contentBlockIndex": index, "start": {}}),
    )
}

pub fn text_delta(index: u64, text: &str) -> Bytes {
    converse(
        "contentBlockDelta",
        json!({"contentBlockIndex": index, "delta": {"text": text}}),
    )
}

pub fn tool_start(index: u64, id: &str, name: &str) -> Bytes {
    converse(
        "contentBlockStart",
        json!({"contentBlockIndex": index, "start": {"toolUse": {"toolUseId": id, "name": name}}}),
    )
}

pub fn tool_delta(index: u64, input: &str) -> Bytes {
    converse(
        "contentBlockDelta",
        json!({"contentBlockIndex": index, "delta": {"toolUse": {"input": input}}}),
    )
}

/// A character-span citation of document 0 quoting `passage`.
pub fn citation_delta(index: u64, passage: &str) -> Bytes {
    converse(
        "contentBlockDelta",
        json!({"contentBlockIndex": index, "delta": {"citation": {
            "title": "Atlas",
            "sourceContent": [{"text": passage}],
            "location": {"documentChar": {"documentIndex": 0, "start": 0, "end": passage.len()}}
        }}}),
    )
}

pub fn block_stop(index: u64) -> Bytes {
    converse("contentBlockStop", json!({"contentBlockIndex": index}))
}

pub fn message_stop(reason: &str) -> Bytes {
    converse("messageStop", json!({"stopReason": reason}))
}

pub fn metadata(input: u32, output: u32) -> Bytes {
    converse(
        "metadata",
        json!({"usage": {"inputTokens": input, "outputTokens": output, "totalTokens": input + output}}),
    )
}

pub fn exception(exception_type: &str, message: &str) -> Bytes {
    exception_frame(exception_type, json!({"message": message}).to_string().as_bytes()).unwrap()
}

/// `Hi` answered with `end_turn`, 10 tokens in and 2 out.
pub fn hi_stream() -> Bytes {
    body(&[
        message_start(),
        text_start(0),
        text_delta(0, "Hi"),
        block_stop(0),
        message_stop("end_turn"),
        metadata(10, 2),
    ])
}

/// One tool call with its input split into the given fragments.
pub fn tool_stream(id: &str, name: &str, fragments: &[&str]) -> Bytes {
    let mut frames = vec![message_start(), tool_start(0, id, name)];
    frames.extend(fragments.iter().map(|f| tool_delta(0, f)));
    frames.extend([block_stop(0), message_stop("tool_use"), metadata(20, 5)]);
    body(&frames)
}

// ---------------------------------------------------------------------------
// Anthropic frames
// ---------------------------------------------------------------------------

/// Wrap one Anthropic streaming event the way `invoke-with-response-stream` does.
pub fn chunk(event: Value) -> Bytes {
    let encoded = base64::engine::general_purpose::STANDARD.encode(event.to_string());
    event_frame("chunk", json!({"bytes": encoded}).to_string().as_bytes()).unwrap()
}
