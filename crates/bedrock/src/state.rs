use std::collections::BTreeMap;

use riverbed_tool_runtime::{CitationGroup, FinishReason, Usage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    ToolUse,
    Thinking,
}

/// A tool call whose input is still arriving.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub partial_input: String,
}

/// Everything learned so far about the response of one round-trip.
///
/// Owned by a single [`crate::EventProcessor`]; the per-block fields are
/// cleared on block stop, the accumulators live until [`StreamState::reset`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamState {
    pub current_block_index: Option<u64>,
    pub current_block_type: Option<BlockKind>,
    pub accumulated_text: String,
    /// Keyed by content block index.
    pub tool_calls: BTreeMap<u64, PendingToolCall>,
    pub reasoning_text: String,
    pub reasoning_id: Option<String>,
    pub citations: Vec<CitationGroup>,
    pub finish_reason: Option<FinishReason>,
    pub message_id: Option<String>,
    pub model: String,
    pub usage: Option<Usage>,
}

impl StreamState {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Clear everything except the model.
    pub fn reset(&mut self) {
        let model = std::mem::take(&mut self.model);
        *self = Self::new(model);
    }

    pub fn open_block(&mut self, index: u64, kind: BlockKind) {
        self.current_block_index = Some(index);
        self.current_block_type = Some(kind);
    }

    pub fn close_block(&mut self) {
        self.current_block_index = None;
        self.current_block_type = None;
    }

    pub fn open(&self) -> Option<(u64, BlockKind)> {
        self.current_block_index.zip(self.current_block_type)
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn message_id(&self) -> &str {
        self.message_id.as_deref().unwrap_or_default()
    }
}
