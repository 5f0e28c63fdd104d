//! Frames in, [`StreamEvent`]s out.
//!
//! The processor is dialect-neutral: a [`PayloadDecoder`] reads each frame
//! into [`StreamPayload`]s and the state machine here applies them to a
//! [`StreamState`]. Blocks open one at a time. A text or reasoning delta
//! with no open block opens one implicitly, since Converse only announces
//! tool-use blocks. Anything else out of order is a protocol violation.
//! Processing ends at the first `StreamEnd` or error.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use riverbed_core::IdSource;
use riverbed_eventstream::{Frame, FrameStream};
use riverbed_tool_runtime::citation::push_citation;
use riverbed_tool_runtime::{
    parse_tool_arguments, EventStream, FinishReason, StreamEvent, ToolCall, Usage,
};
use tracing::{debug, trace, warn};

use crate::dialect::Dialect;
use crate::error::BedrockError;
use crate::payload::{BlockDelta, BlockStart, PayloadDecoder, StreamPayload};
use crate::state::{BlockKind, PendingToolCall, StreamState};

pub struct EventProcessor {
    dialect: Dialect,
    decoder: Box<dyn PayloadDecoder>,
    ids: Arc<dyn IdSource>,
    state: StreamState,
    finished: bool,
}

impl EventProcessor {
    pub fn new(dialect: Dialect, model: impl Into<String>, ids: Arc<dyn IdSource>) -> Self {
        Self {
            dialect,
            decoder: dialect.payload_decoder(),
            ids,
            state: StreamState::new(model),
            finished: false,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// True once a `StreamEnd` or an error has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Apply one frame. A failure is reported as a final
    /// [`StreamEvent::Error`]; frames after that are ignored.
    pub fn process_frame(&mut self, frame: &Frame) -> Vec<StreamEvent> {
        if self.finished {
            trace!(event_type = %frame.event_type, "frame after end of stream ignored");
            return Vec::new();
        }

        let payloads = match self.decoder.decode(frame) {
            Ok(payloads) => payloads,
            Err(e) => return vec![self.fail(e)],
        };

        let mut events = Vec::new();
        for payload in payloads {
            match self.process_payload(payload) {
                Ok(out) => events.extend(out),
                Err(e) => {
                    events.push(self.fail(e));
                    break;
                }
            }
            if self.finished {
                break;
            }
        }
        events
    }

    /// Record a failure and return its terminal event.
    pub fn fail(&mut self, error: BedrockError) -> StreamEvent {
        warn!(dialect = %self.dialect, error = %error, "stream failed");
        self.finished = true;
        StreamEvent::error(error.kind(), error.to_string())
    }

    /// Called when the frames run out. A stream that never reached its
    /// metadata event did not complete.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        Some(self.fail(BedrockError::protocol("stream ended before metadata")))
    }

    pub fn process_payload(
        &mut self,
        payload: StreamPayload,
    ) -> Result<Vec<StreamEvent>, BedrockError> {
        match payload {
            StreamPayload::MessageStart => {
                let message_id = self.ids.next_id();
                debug!(message_id = %message_id, model = %self.state.model, "message started");
                self.state.message_id = Some(message_id.clone());
                Ok(vec![StreamEvent::StreamStart {
                    message_id,
                    model: self.state.model.clone(),
                }])
            }
            StreamPayload::BlockStart { index, start } => self.start_block(index, start),
            StreamPayload::BlockDelta { index, delta } => self.apply_delta(index, delta),
            StreamPayload::BlockStop { index } => self.stop_block(index),
            StreamPayload::MessageStop { stop_reason } => {
                if let Some(reason) = stop_reason {
                    self.state.finish_reason = Some(self.dialect.map_finish_reason(&reason)?);
                }
                Ok(Vec::new())
            }
            StreamPayload::Metadata { usage } => Ok(vec![self.end(usage)]),
            StreamPayload::Exception {
                event_type,
                message,
            } => Err(BedrockError::from_exception(&event_type, message)),
            StreamPayload::Ignored { event_type } => {
                trace!(event_type = %event_type, "ignored");
                Ok(Vec::new())
            }
        }
    }

    fn message_id(&mut self) -> String {
        match &self.state.message_id {
            Some(id) => id.clone(),
            None => {
                let id = self.ids.next_id();
                self.state.message_id = Some(id.clone());
                id
            }
        }
    }

    fn start_block(
        &mut self,
        index: u64,
        start: BlockStart,
    ) -> Result<Vec<StreamEvent>, BedrockError> {
        if let Some((open, _)) = self.state.open() {
            return Err(BedrockError::protocol(format!(
                "block {index} started while block {open} is still open"
            )));
        }

        let event = match start {
            BlockStart::Text => {
                self.state.open_block(index, BlockKind::Text);
                Some(StreamEvent::TextStart {
                    message_id: self.message_id(),
                })
            }
            BlockStart::ToolUse { id, name } => {
                self.state.open_block(index, BlockKind::ToolUse);
                let id = if id.is_empty() { self.ids.next_id() } else { id };
                self.state.tool_calls.insert(
                    index,
                    PendingToolCall {
                        id,
                        name,
                        partial_input: String::new(),
                    },
                );
                None
            }
            BlockStart::Thinking => {
                self.state.open_block(index, BlockKind::Thinking);
                Some(self.thinking_start())
            }
        };
        Ok(event.into_iter().collect())
    }

    fn thinking_start(&mut self) -> StreamEvent {
        let reasoning_id = self.ids.next_id();
        self.state.reasoning_id = Some(reasoning_id.clone());
        StreamEvent::ThinkingStart { reasoning_id }
    }

    /// Ensure a block of `kind` is open at `index`, opening one implicitly
    /// when nothing is open and the kind allows it.
    fn expect_block(
        &mut self,
        index: u64,
        kind: BlockKind,
        events: &mut Vec<StreamEvent>,
    ) -> Result<(), BedrockError> {
        match self.state.open() {
            Some((open, open_kind)) => {
                if open != index {
                    return Err(BedrockError::protocol(format!(
                        "delta for block {index} while block {open} is open"
                    )));
                }
                if open_kind != kind {
                    return Err(BedrockError::protocol(format!(
                        "{kind:?} delta for {open_kind:?} block {index}"
                    )));
                }
                Ok(())
            }
            None => match kind {
                BlockKind::Text => {
                    self.state.open_block(index, BlockKind::Text);
                    events.push(StreamEvent::TextStart {
                        message_id: self.message_id(),
                    });
                    Ok(())
                }
                BlockKind::Thinking => {
                    self.state.open_block(index, BlockKind::Thinking);
                    events.push(self.thinking_start());
                    Ok(())
                }
                BlockKind::ToolUse => Err(BedrockError::protocol(format!(
                    "tool input for block {index}, which was never started"
                ))),
            },
        }
    }

    fn apply_delta(
        &mut self,
        index: u64,
        delta: BlockDelta,
    ) -> Result<Vec<StreamEvent>, BedrockError> {
        let mut events = Vec::new();
        match delta {
            BlockDelta::Text(text) => {
                if text.is_empty() {
                    return Ok(events);
                }
                self.expect_block(index, BlockKind::Text, &mut events)?;
                self.state.accumulated_text.push_str(&text);
                events.push(StreamEvent::TextDelta {
                    message_id: self.message_id(),
                    delta: text,
                });
            }
            BlockDelta::ToolInput(fragment) => {
                self.expect_block(index, BlockKind::ToolUse, &mut events)?;
                let call = self.state.tool_calls.get_mut(&index).ok_or_else(|| {
                    BedrockError::protocol(format!("no tool call recorded for block {index}"))
                })?;
                call.partial_input.push_str(&fragment);
            }
            BlockDelta::Reasoning(text) => {
                if text.is_empty() {
                    return Ok(events);
                }
                self.expect_block(index, BlockKind::Thinking, &mut events)?;
                self.state.reasoning_text.push_str(&text);
                events.push(StreamEvent::ThinkingDelta {
                    reasoning_id: self.state.reasoning_id.clone().unwrap_or_default(),
                    delta: text,
                });
            }
            BlockDelta::Citation(citation) => {
                self.expect_block(index, BlockKind::Text, &mut events)?;
                push_citation(
                    &mut self.state.citations,
                    &self.state.accumulated_text,
                    citation.clone(),
                );
                events.push(StreamEvent::Citation {
                    message_id: self.message_id(),
                    citation,
                });
            }
        }
        Ok(events)
    }

    fn stop_block(&mut self, index: u64) -> Result<Vec<StreamEvent>, BedrockError> {
        let Some((open, kind)) = self.state.open() else {
            trace!(index, "stop without an open block");
            return Ok(Vec::new());
        };
        if open != index {
            return Err(BedrockError::protocol(format!(
                "stop for block {index} while block {open} is open"
            )));
        }

        let event = match kind {
            BlockKind::Text => StreamEvent::TextComplete {
                message_id: self.message_id(),
            },
            BlockKind::ToolUse => {
                let pending = self.state.tool_calls.get(&index).ok_or_else(|| {
                    BedrockError::protocol(format!("no tool call recorded for block {index}"))
                })?;
                let tool_call = ToolCall::new(
                    pending.id.clone(),
                    pending.name.clone(),
                    parse_tool_arguments(&pending.partial_input),
                );
                debug!(tool = %tool_call.name, id = %tool_call.id, "tool call ready");
                StreamEvent::ToolCall {
                    message_id: self.message_id(),
                    tool_call,
                }
            }
            BlockKind::Thinking => StreamEvent::ThinkingComplete {
                reasoning_id: self.state.reasoning_id.clone().unwrap_or_default(),
            },
        };
        self.state.close_block();
        Ok(vec![event])
    }

    fn end(&mut self, usage: Usage) -> StreamEvent {
        self.finished = true;
        self.state.usage = Some(usage);
        let finish_reason = self.state.finish_reason.unwrap_or(FinishReason::Unknown);
        debug!(
            finish_reason = ?finish_reason,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "stream complete"
        );
        StreamEvent::StreamEnd {
            finish_reason,
            usage,
            citations: self.state.citations.clone(),
        }
    }

    /// Drive the processor over a frame stream. Frames stop being read as
    /// soon as the processor finishes.
    pub fn into_events(self, frames: FrameStream) -> EventStream {
        struct Pump {
            processor: EventProcessor,
            frames: FrameStream,
            pending: VecDeque<StreamEvent>,
        }

        let pump = Pump {
            processor: self,
            frames,
            pending: VecDeque::new(),
        };

        stream::unfold(pump, |mut pump| async move {
            loop {
                if let Some(event) = pump.pending.pop_front() {
                    return Some((event, pump));
                }
                if pump.processor.is_finished() {
                    return None;
                }
                match pump.frames.next().await {
                    Some(Ok(frame)) => {
                        let events = pump.processor.process_frame(&frame);
                        pump.pending.extend(events);
                    }
                    Some(Err(e)) => {
                        let event = pump.processor.fail(BedrockError::from(e));
                        pump.pending.push_back(event);
                    }
                    None => {
                        let event = pump.processor.finish()?;
                        pump.pending.push_back(event);
                    }
                }
            }
        })
        .boxed()
    }
}
