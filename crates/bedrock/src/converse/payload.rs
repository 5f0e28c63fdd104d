//! Request bodies for `/converse` and `/converse-stream`.

use riverbed_core::Mime;
use riverbed_tool_runtime::citation::{segments, TextSegment};
use riverbed_tool_runtime::{
    CacheType, ChatRequest, Media, MediaKind, MediaSource, Message, SystemPrompt, ToolCall,
    ToolChoice, ToolDefinition, ToolResult,
};
use serde_json::{json, Map, Value};

use super::citations::group_to_converse;
use crate::error::BedrockError;

/// Provider options forwarded verbatim when present and non-null.
pub const PASSTHROUGH_OPTIONS: [&str; 6] = [
    "additionalModelRequestFields",
    "additionalModelResponseFieldPaths",
    "guardrailConfig",
    "performanceConfig",
    "promptVariables",
    "requestMetadata",
];

/// Build the request body. `step` is the number of round-trips already
/// made; tool choice is only sent on the first.
pub fn build_payload(request: &ChatRequest, step: usize) -> Result<Value, BedrockError> {
    let mut body = Map::new();

    let mut inference = Map::new();
    if let Some(max_tokens) = request.max_tokens {
        inference.insert("maxTokens".into(), json!(max_tokens));
    }
    if let Some(temperature) = request.temperature {
        inference.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = request.top_p {
        inference.insert("topP".into(), json!(top_p));
    }
    if !inference.is_empty() {
        body.insert("inferenceConfig".into(), Value::Object(inference));
    }

    body.insert("messages".into(), Value::Array(map_messages(&request.messages)?));

    let system = map_system_prompts(&request.system_prompts);
    if !system.is_empty() {
        body.insert("system".into(), Value::Array(system));
    }

    if !request.tools.is_empty() {
        let mut tool_config = Map::new();
        tool_config.insert("tools".into(), Value::Array(map_tools(&request.tools)));
        if step == 0 {
            if let Some(choice) = &request.tool_choice {
                tool_config.insert("toolChoice".into(), map_tool_choice(choice));
            }
        }
        body.insert("toolConfig".into(), Value::Object(tool_config));
    }

    for key in PASSTHROUGH_OPTIONS {
        if let Some(value) = request.provider_option(key) {
            body.insert(key.to_string(), value.clone());
        }
    }

    Ok(Value::Object(body))
}

pub fn map_messages(messages: &[Message]) -> Result<Vec<Value>, BedrockError> {
    let mut mapped = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            Message::User { text, media, cache } => mapped.push(map_user(text, media, *cache)?),
            Message::Assistant {
                text,
                tool_calls,
                citations,
                cache,
            } => {
                let mut content: Vec<Value> = segments(text, citations)
                    .into_iter()
                    .map(|segment| match segment {
                        TextSegment::Plain(text) => json!({ "text": text }),
                        TextSegment::Cited(group) => group_to_converse(group),
                    })
                    .collect();
                content.extend(tool_calls.iter().map(map_tool_call));
                push_cache_point(&mut content, *cache);
                if !content.is_empty() {
                    mapped.push(json!({ "role": "assistant", "content": content }));
                }
            }
            Message::ToolResults { results } => {
                let content: Vec<Value> = results.iter().map(map_tool_result).collect();
                mapped.push(json!({ "role": "user", "content": content }));
            }
            Message::System(_) => {
                return Err(BedrockError::InvalidRequest(
                    "Converse does not accept system messages in the message list; \
                     use system prompts instead"
                        .to_string(),
                ))
            }
        }
    }
    Ok(mapped)
}

fn map_user(text: &str, media: &[Media], cache: Option<CacheType>) -> Result<Value, BedrockError> {
    let mut content = vec![json!({ "text": text })];
    for item in media.iter().filter(|m| m.kind == MediaKind::Image) {
        content.push(map_media(item)?);
    }
    for item in media.iter().filter(|m| m.kind == MediaKind::Document) {
        content.push(map_media(item)?);
    }
    push_cache_point(&mut content, cache);
    Ok(json!({ "role": "user", "content": content }))
}

fn map_media(media: &Media) -> Result<Value, BedrockError> {
    let bytes = match &media.source {
        MediaSource::Base64(data) => data,
        MediaSource::Url(url) => {
            return Err(BedrockError::InvalidRequest(format!(
                "media must be sent inline, URL sources are not supported ({url})"
            )))
        }
    };
    let format = Mime::from_mime_type(&media.mime_type)
        .map(Mime::extension)
        .ok_or_else(|| {
            BedrockError::InvalidRequest(format!("unsupported media type {}", media.mime_type))
        })?;

    Ok(match media.kind {
        MediaKind::Image => json!({
            "image": { "format": format, "source": { "bytes": bytes } }
        }),
        MediaKind::Document => json!({
            "document": {
                "format": format,
                "name": media.title.as_deref().unwrap_or("document"),
                "source": { "bytes": bytes },
            }
        }),
    })
}

fn map_tool_call(call: &ToolCall) -> Value {
    json!({
        "toolUse": {
            "toolUseId": call.id,
            "name": call.name,
            "input": call.arguments,
        }
    })
}

fn map_tool_result(result: &ToolResult) -> Value {
    json!({
        "toolResult": {
            "status": if result.success { "success" } else { "error" },
            "toolUseId": result.tool_call_id,
            "content": [{ "text": result.content_text() }],
        }
    })
}

pub fn map_system_prompts(prompts: &[SystemPrompt]) -> Vec<Value> {
    let mut out = Vec::new();
    for prompt in prompts {
        out.push(json!({ "text": prompt.text }));
        push_cache_point(&mut out, prompt.cache);
    }
    out
}

pub fn map_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    let mut out = Vec::new();
    for tool in tools {
        out.push(json!({
            "toolSpec": {
                "name": tool.name,
                "description": tool.description,
                "inputSchema": { "json": tool.input_schema() },
            }
        }));
        push_cache_point(&mut out, tool.cache);
    }
    out
}

pub fn map_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({ "auto": {} }),
        ToolChoice::Any => json!({ "any": {} }),
        ToolChoice::Tool(name) => json!({ "tool": { "name": name } }),
    }
}

fn push_cache_point(content: &mut Vec<Value>, cache: Option<CacheType>) {
    if let Some(cache) = cache {
        content.push(json!({ "cachePoint": { "type": cache.as_str() } }));
    }
}
