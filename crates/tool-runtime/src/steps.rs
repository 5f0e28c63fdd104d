use std::sync::Arc;

use tracing::{debug, info};

use crate::conversation::Message;
use crate::provider::{LlmError, ToolAwareLlmProvider};
use crate::registry::ToolRegistry;
use crate::request::{ChatRequest, Step, TextResponse};
use crate::runtime::requests_tools;
use crate::stream::{FinishReason, Usage};

/// Non-streamed counterpart of [`crate::ToolLoop`]: one complete response
/// per step, tools run between steps, same step bound.
pub struct StepLoop {
    provider: Arc<dyn ToolAwareLlmProvider>,
    registry: Arc<ToolRegistry>,
}

impl StepLoop {
    pub fn new(provider: Arc<dyn ToolAwareLlmProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self { provider, registry }
    }

    pub async fn run(&self, mut request: ChatRequest) -> Result<TextResponse, LlmError> {
        let mut steps: Vec<Step> = Vec::new();

        loop {
            let step_index = steps.len();
            debug!(
                provider = self.provider.provider_name(),
                step = step_index,
                "Requesting completion"
            );
            let completion = self.provider.complete(&request, step_index).await?;

            request.push_message(Message::assistant_turn(
                completion.text.clone(),
                completion.tool_calls.clone(),
                completion.citations.clone(),
            ));

            let mut step = Step {
                text: completion.text,
                finish_reason: completion.finish_reason,
                tool_calls: completion.tool_calls,
                tool_results: Vec::new(),
                usage: completion.usage,
                meta: completion.meta,
            };

            if !requests_tools(&step.tool_calls) {
                if step.finish_reason == FinishReason::Unknown {
                    return Err(LlmError::ProtocolViolation(
                        "response carried no recognised stop reason".to_string(),
                    ));
                }
                steps.push(step);
                break;
            }

            info!(step = step_index, count = step.tool_calls.len(), "Executing tool calls");
            for call in &step.tool_calls {
                step.tool_results.push(self.registry.execute(call).await);
            }
            request.push_message(Message::tool_results(step.tool_results.clone()));
            steps.push(step);

            if steps.len() >= request.max_steps {
                info!(steps = steps.len(), "Step limit reached");
                break;
            }
        }

        Ok(into_response(steps, request.messages))
    }
}

fn into_response(steps: Vec<Step>, messages: Vec<Message>) -> TextResponse {
    let mut usage = Usage::default();
    for step in &steps {
        usage.add(&step.usage);
    }

    let last = steps.last().cloned();
    let (text, finish_reason, tool_calls, tool_results, meta) = match last {
        Some(s) => (s.text, s.finish_reason, s.tool_calls, s.tool_results, s.meta),
        None => Default::default(),
    };

    TextResponse {
        text,
        finish_reason,
        steps,
        tool_calls,
        tool_results,
        usage,
        meta,
        messages,
    }
}
