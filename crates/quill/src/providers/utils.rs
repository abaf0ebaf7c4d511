use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};

use super::errors::{ProviderError, ProviderResult};
use crate::errors::AgentError;
use crate::models::content::FileContent;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Placeholder used when the model asked for a tool we could not decode
pub const INVALID_TOOL_NAME: &str = "invalid_tool";

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = json!({
            "role": message.role
        });

        let mut parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut output = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        parts.push(json!({"type": "text", "text": text.text}));
                    }
                }
                MessageContent::File(file) => parts.push(convert_file(file)),
                MessageContent::Image(image) => parts.push(json!({
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:{};base64,{}", image.mime_type, image.data)
                    }
                })),
                MessageContent::ToolRequest(request) => {
                    let (name, arguments) = match &request.tool_call {
                        Ok(tool_call) => (
                            sanitize_function_name(&tool_call.name),
                            tool_call.arguments.to_string(),
                        ),
                        // the call still has to appear in the history, its response carries the error
                        Err(_) => (INVALID_TOOL_NAME.to_string(), "{}".to_string()),
                    };
                    tool_calls.push(json!({
                        "id": request.id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": arguments,
                        }
                    }));
                }
                MessageContent::ToolResponse(response) => {
                    output.push(json!({
                        "role": "tool",
                        "content": response.output_text(),
                        "tool_call_id": response.id
                    }));
                }
            }
        }

        match parts.as_slice() {
            [] => {}
            [only] if only["type"] == "text" => converted["content"] = only["text"].clone(),
            _ => converted["content"] = json!(parts),
        }
        if !tool_calls.is_empty() {
            converted["tool_calls"] = json!(tool_calls);
        }

        if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
            output.insert(0, converted);
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert a file attachment into an openai content part based on its mime type
pub fn convert_file(file: &FileContent) -> Value {
    if let Some(format) = file.mime_type.strip_prefix("audio/") {
        let format = match format {
            "mpeg" | "mp3" => "mp3",
            other => other,
        };
        json!({
            "type": "input_audio",
            "input_audio": {
                "data": file.base64_data(),
                "format": format,
            }
        })
    } else {
        json!({
            "type": "file",
            "file": {
                "filename": file.filename.clone().unwrap_or_else(|| "attachment".to_string()),
                "file_data": format!("data:{};base64,{}", file.mime_type, file.base64_data()),
            }
        })
    }
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> ProviderResult<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(ProviderError::Response(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: Value) -> ProviderResult<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .cloned()
        .ok_or_else(|| ProviderError::Response("No choices in response".to_string()))?;
    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(|t| t.as_str()) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|t| t.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default()
                .to_string();

            message = message.with_tool_request(id.clone(), parse_tool_call(&id, &function_name, &arguments));
        }
    }

    Ok(message)
}

/// Turn a raw function name and json-encoded arguments into a tool call, keeping
/// malformed calls as errors so they can be answered instead of dropped
pub fn parse_tool_call(id: &str, function_name: &str, arguments: &str) -> Result<ToolCall, AgentError> {
    if !is_valid_function_name(function_name) {
        return Err(AgentError::ToolNotFound(format!(
            "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
            function_name
        )));
    }
    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str::<Value>(arguments)
        .map(|params| ToolCall::new(function_name, params))
        .map_err(|e| {
            AgentError::InvalidParameters(format!(
                "Could not interpret tool use parameters for id {}: {}",
                id, e
            ))
        })
}

/// Extract the text delta from one chat completion stream chunk
pub fn openai_stream_delta(data: &str) -> ProviderResult<Option<String>> {
    let chunk: Value = serde_json::from_str(data)
        .map_err(|e| ProviderError::Response(format!("Invalid stream chunk: {}", e)))?;
    if let Some(error) = chunk.get("error") {
        return Err(ProviderError::Response(error.to_string()));
    }
    Ok(chunk["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|text| !text.is_empty())
        .map(String::from))
}

/// OpenAI wants the system prompt as the first message
pub fn system_message(system: &str) -> Option<Value> {
    (!system.is_empty()).then(|| json!({"role": Role::System, "content": system}))
}

pub fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

pub fn check_openai_context_length_error(error: &Value) -> Option<ProviderError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ProviderError::ContextLengthExceeded(message))
    } else {
        None
    }
}
