use riverbed_tool_runtime::{
    CacheType, ChatRequest, Media, MediaKind, MediaSource, Message, SystemPrompt, ToolCall,
    ToolChoice, ToolDefinition, ToolResult,
};
use serde_json::{json, Map, Value};

use super::API_VERSION;
use crate::error::BedrockError;

/// Build an Anthropic Messages body. The API requires `max_tokens`, so
/// `default_max_tokens` fills in when the request leaves it unset.
pub fn build_payload(request: &ChatRequest, default_max_tokens: u32) -> Result<Value, BedrockError> {
    let mut body = Map::new();
    body.insert("anthropic_version".into(), json!(API_VERSION));
    body.insert("messages".into(), Value::Array(map_messages(&request.messages)?));
    body.insert(
        "max_tokens".into(),
        json!(request.max_tokens.unwrap_or(default_max_tokens)),
    );

    if !request.system_prompts.is_empty() {
        body.insert("system".into(), Value::Array(map_system_prompts(&request.system_prompts)));
    }
    if let Some(temperature) = request.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = request.top_p {
        body.insert("top_p".into(), json!(top_p));
    }
    if !request.tools.is_empty() {
        body.insert("tools".into(), Value::Array(map_tools(&request.tools)));
        if let Some(choice) = &request.tool_choice {
            body.insert("tool_choice".into(), map_tool_choice(choice));
        }
    }

    Ok(Value::Object(body))
}

fn cache_control(cache: Option<CacheType>) -> Option<Value> {
    cache.map(|c| json!({ "type": c.as_str() }))
}

fn with_cache_control(mut block: Value, cache: Option<CacheType>) -> Value {
    if let (Some(control), Some(obj)) = (cache_control(cache), block.as_object_mut()) {
        obj.insert("cache_control".into(), control);
    }
    block
}

pub fn map_messages(messages: &[Message]) -> Result<Vec<Value>, BedrockError> {
    messages.iter().map(map_message).collect()
}

fn map_message(message: &Message) -> Result<Value, BedrockError> {
    match message {
        Message::User { text, media, cache } => {
            let mut content = vec![with_cache_control(
                json!({ "type": "text", "text": text }),
                *cache,
            )];
            for item in media {
                content.push(map_image(item, *cache)?);
            }
            Ok(json!({ "role": "user", "content": content }))
        }
        Message::Assistant {
            text,
            tool_calls,
            citations,
            cache,
        } => {
            if !citations.is_empty() {
                return Err(BedrockError::Unsupported {
                    dialect: "anthropic",
                    capability: "citations",
                });
            }
            let mut content = Vec::new();
            if !text.is_empty() {
                content.push(with_cache_control(
                    json!({ "type": "text", "text": text }),
                    *cache,
                ));
            }
            content.extend(tool_calls.iter().map(map_tool_call));
            Ok(json!({ "role": "assistant", "content": content }))
        }
        Message::ToolResults { results } => {
            let content: Vec<Value> = results.iter().map(map_tool_result).collect();
            Ok(json!({ "role": "user", "content": content }))
        }
        Message::System(_) => Err(BedrockError::InvalidRequest(
            "Anthropic does not accept system messages in the message list; \
             use system prompts instead"
                .to_string(),
        )),
    }
}

fn map_image(media: &Media, cache: Option<CacheType>) -> Result<Value, BedrockError> {
    if media.kind == MediaKind::Document {
        return Err(BedrockError::Unsupported {
            dialect: "anthropic",
            capability: "documents",
        });
    }
    let data = match &media.source {
        MediaSource::Base64(data) => data,
        MediaSource::Url(url) => {
            return Err(BedrockError::InvalidRequest(format!(
                "media must be sent inline, URL sources are not supported ({url})"
            )))
        }
    };
    Ok(with_cache_control(
        json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": media.mime_type,
                "data": data,
            }
        }),
        cache,
    ))
}

fn map_tool_call(call: &ToolCall) -> Value {
    json!({
        "type": "tool_use",
        "id": call.id,
        "name": call.name,
        "input": call.arguments,
    })
}

fn map_tool_result(result: &ToolResult) -> Value {
    let mut block = json!({
        "type": "tool_result",
        "tool_use_id": result.tool_call_id,
        "content": result.content_text(),
    });
    if !result.success {
        block["is_error"] = json!(true);
    }
    block
}

pub fn map_system_prompts(prompts: &[SystemPrompt]) -> Vec<Value> {
    prompts
        .iter()
        .map(|p| with_cache_control(json!({ "type": "text", "text": p.text }), p.cache))
        .collect()
}

pub fn map_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            with_cache_control(
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema(),
                }),
                tool.cache,
            )
        })
        .collect()
}

pub fn map_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({ "type": "auto" }),
        ToolChoice::Any => json!({ "type": "any" }),
        ToolChoice::Tool(name) => json!({ "type": "tool", "name": name }),
    }
}
