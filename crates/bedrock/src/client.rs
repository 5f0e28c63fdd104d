use std::sync::Arc;

use async_trait::async_trait;
use riverbed_core::{BedrockConfig, Config, IdSource, RandomIds};
use riverbed_eventstream::FrameSource;
use riverbed_tool_runtime::{
    ChatRequest, Completion, EventStream, LlmError, Message, StepLoop, StructuredResponse,
    TextResponse, ToolAwareLlmProvider, ToolLoop, ToolRegistry,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::dialect::{Capability, Dialect};
use crate::error::BedrockError;
use crate::processor::EventProcessor;
use crate::transport::{HttpRequest, HttpTransport, Transport};

pub const DEFAULT_MAX_TOKENS: u32 = 4096;

const JSON_MODE_MESSAGE: &str = "Respond with ONLY JSON (i.e. not in backticks or a code block, \
with NO CONTENT outside the JSON) that matches the following schema:";

/// Amazon Bedrock runtime client.
///
/// Each call picks a [`Dialect`] for the request, renders the body in that
/// dialect and reads the response back into provider-agnostic types. Tool
/// loops are built on top via [`BedrockProvider::text`] and
/// [`BedrockProvider::stream`].
pub struct BedrockProvider {
    config: BedrockConfig,
    transport: Arc<dyn Transport>,
    ids: Arc<dyn IdSource>,
    default_max_tokens: u32,
}

impl BedrockProvider {
    pub fn new(config: BedrockConfig) -> Result<Self, BedrockError> {
        let transport = HttpTransport::new(config.timeout(), config.api_key.clone())?;
        Ok(Self {
            config,
            transport: Arc::new(transport),
            ids: Arc::new(RandomIds),
            default_max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Build from the full runtime config, taking the token default from the agent section.
    pub fn from_config(config: &Config) -> Result<Self, BedrockError> {
        Ok(Self::new(config.bedrock.clone())?.with_default_max_tokens(config.agent.max_tokens))
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    pub fn config(&self) -> &BedrockConfig {
        &self.config
    }

    pub fn dialect(&self, request: &ChatRequest) -> Result<Dialect, BedrockError> {
        Dialect::select(request, self.config.api_schema.as_deref(), self.model(request))
    }

    fn model<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.model.is_empty() {
            &self.config.model
        } else {
            &request.model
        }
    }

    fn caching_enabled(&self, request: &ChatRequest) -> bool {
        request
            .provider_option("enableCaching")
            .and_then(Value::as_bool)
            .unwrap_or(self.config.enable_caching)
    }

    /// Validate and render one round-trip, without sending it.
    pub fn prepare(
        &self,
        request: &ChatRequest,
        step: usize,
        streaming: bool,
    ) -> Result<(Dialect, HttpRequest), BedrockError> {
        let dialect = self.dialect(request)?;
        dialect.ensure(if streaming {
            Capability::Stream
        } else {
            Capability::Text
        })?;
        dialect.validate(request)?;

        let body = dialect.build_payload(request, step, self.default_max_tokens)?;
        let url = format!(
            "{}/model/{}/{}",
            self.config.base_url(),
            self.model(request),
            dialect.endpoint(streaming)
        );
        let caching = if self.caching_enabled(request) {
            "enabled"
        } else {
            "disabled"
        };
        let accept = if streaming {
            "application/vnd.amazon.eventstream"
        } else {
            "application/json"
        };

        Ok((
            dialect,
            HttpRequest {
                url,
                headers: vec![
                    ("accept".to_string(), accept.to_string()),
                    ("explicitPromptCaching".to_string(), caching.to_string()),
                ],
                body,
            },
        ))
    }

    /// Decode a recorded or live response body into events.
    pub fn events_from_source(
        &self,
        dialect: Dialect,
        model: impl Into<String>,
        source: FrameSource,
    ) -> EventStream {
        EventProcessor::new(dialect, model, self.ids.clone()).into_events(source.into_frames())
    }

    /// Run the non-streamed tool loop.
    pub async fn text(
        self: &Arc<Self>,
        request: ChatRequest,
        registry: Arc<ToolRegistry>,
    ) -> Result<TextResponse, LlmError> {
        StepLoop::new(self.clone(), registry).run(request).await
    }

    /// Start the streamed tool loop. Nothing is sent until the first pull.
    pub fn stream(self: &Arc<Self>, request: ChatRequest, registry: Arc<ToolRegistry>) -> ToolLoop {
        ToolLoop::new(self.clone(), registry, request)
    }

    /// Ask for JSON matching `schema` and parse the answer.
    pub async fn structured(
        &self,
        mut request: ChatRequest,
        schema: &Value,
    ) -> Result<StructuredResponse, LlmError> {
        self.dialect(&request)?.ensure(Capability::Structured)?;

        let instruction = request
            .provider_option("jsonModeMessage")
            .and_then(Value::as_str)
            .unwrap_or(JSON_MODE_MESSAGE)
            .to_string();
        let pretty = serde_json::to_string_pretty(schema)
            .map_err(|e| LlmError::InvalidRequest(format!("schema is not serializable: {e}")))?;
        request.push_message(Message::user(format!("{instruction} \n {pretty}")));

        let completion = self.complete(&request, 0).await?;
        let structured: Value = serde_json::from_str(completion.text.trim()).map_err(|e| {
            LlmError::InvalidResponse(format!("model did not answer with JSON: {e}"))
        })?;
        request.push_message(Message::assistant_turn(
            completion.text.clone(),
            Vec::new(),
            completion.citations,
        ));

        Ok(StructuredResponse {
            text: completion.text,
            structured,
            finish_reason: completion.finish_reason,
            usage: completion.usage,
            meta: completion.meta,
            messages: request.messages,
        })
    }
}

#[async_trait]
impl ToolAwareLlmProvider for BedrockProvider {
    async fn stream_round_trip(
        &self,
        request: &ChatRequest,
        step: usize,
    ) -> Result<EventStream, LlmError> {
        let (dialect, http) = self.prepare(request, step, true)?;
        info!(dialect = %dialect, model = self.model(request), step, "Streaming round-trip");
        let source = self.transport.send_stream(&http).await?;
        debug!(seekable = source.is_seekable(), "Response stream opened");
        Ok(self.events_from_source(dialect, self.model(request), source))
    }

    async fn complete(&self, request: &ChatRequest, step: usize) -> Result<Completion, LlmError> {
        let (dialect, http) = self.prepare(request, step, false)?;
        info!(dialect = %dialect, model = self.model(request), step, "Completion request");
        let body = self.transport.send_json(&http).await?;
        let completion = dialect.parse_completion(body)?;
        debug!(
            finish_reason = ?completion.finish_reason,
            tool_calls = completion.tool_calls.len(),
            "Completion received"
        );
        Ok(completion)
    }

    fn provider_name(&self) -> &str {
        "bedrock"
    }
}

#[cfg(test)]
mod tests {
    use riverbed_tool_runtime::Media;
    use serde_json::json;

    use super::*;

    fn provider(config: BedrockConfig) -> BedrockProvider {
        BedrockProvider::new(config).unwrap()
    }

    fn local() -> BedrockConfig {
        BedrockConfig {
            endpoint_url: Some("http://localhost:4566/".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn streaming_converse_request() {
        let p = provider(local());
        let req = ChatRequest::new("us.amazon.nova-micro-v1:0").with_prompt("Hi");

        let (dialect, http) = p.prepare(&req, 0, true).unwrap();

        assert_eq!(dialect, Dialect::Converse);
        assert_eq!(
            http.url,
            "http://localhost:4566/model/us.amazon.nova-micro-v1:0/converse-stream"
        );
        assert_eq!(http.header("explicitPromptCaching"), Some("disabled"));
        assert_eq!(http.body["messages"][0]["role"], "user");
    }

    #[test]
    fn empty_model_falls_back_to_config() {
        let p = provider(BedrockConfig {
            model: "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
            ..local()
        });
        let req = ChatRequest::new("").with_prompt("Hi");

        let (dialect, http) = p.prepare(&req, 0, false).unwrap();

        assert_eq!(dialect, Dialect::Anthropic);
        assert!(http
            .url
            .ends_with("/model/anthropic.claude-3-haiku-20240307-v1:0/invoke"));
        assert_eq!(http.body["max_tokens"], 4096);
    }

    #[test]
    fn caching_option_overrides_config() {
        let p = provider(BedrockConfig {
            enable_caching: true,
            ..local()
        });
        let req = ChatRequest::new("m").with_prompt("Hi");
        let (_, http) = p.prepare(&req, 0, true).unwrap();
        assert_eq!(http.header("explicitPromptCaching"), Some("enabled"));

        let req = req.with_provider_option("enableCaching", json!(false));
        let (_, http) = p.prepare(&req, 0, true).unwrap();
        assert_eq!(http.header("explicitPromptCaching"), Some("disabled"));
    }

    #[test]
    fn documents_rejected_for_anthropic() {
        let p = provider(local());
        let req = ChatRequest::new("anthropic.claude-v2").with_messages(vec![
            Message::user_with_media(
                "Summarize",
                vec![Media::document("application/pdf", "UERG", "Report")],
            ),
        ]);
        assert!(matches!(
            p.prepare(&req, 0, true),
            Err(BedrockError::Unsupported {
                capability: "documents",
                ..
            })
        ));
    }

    #[test]
    fn configured_token_default_reaches_anthropic_body() {
        let p = provider(local()).with_default_max_tokens(512);
        let req = ChatRequest::new("anthropic.claude-v2").with_prompt("Hi");
        let (_, http) = p.prepare(&req, 0, true).unwrap();
        assert_eq!(http.body["max_tokens"], 512);
    }
}
