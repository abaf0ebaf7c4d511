use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::base::{CompletionOptions, Provider, TextStream, Usage};
use super::configs::GeminiProviderConfig;
use super::errors::{ProviderError, ProviderResult};
use super::utils::{is_valid_function_name, INVALID_TOOL_NAME};
use crate::errors::AgentError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

pub const GEMINI_HOST: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_MODEL: &str = "gemini-2.0-flash-exp";

// Keywords the gemini schema dialect rejects
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["additionalProperties", "$schema", "$id", "default"];

pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = &data["usageMetadata"];
        let count = |key: &str| usage.get(key).and_then(|v| v.as_i64()).map(|v| v as i32);
        Usage::new(
            count("promptTokenCount"),
            count("candidatesTokenCount"),
            count("totalTokenCount"),
        )
    }

    fn build_payload(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Value {
        // gemini has no system role inside contents, all of it goes to the system instruction
        let mut instructions: Vec<String> = Vec::new();
        if !system.is_empty() {
            instructions.push(system.to_string());
        }
        instructions.extend(
            messages
                .iter()
                .filter(|m| m.role == Role::System)
                .map(|m| m.text())
                .filter(|text| !text.is_empty()),
        );

        let mut object = Map::new();
        object.insert(
            "contents".to_string(),
            Value::Array(messages_to_gemini_spec(messages)),
        );

        if !instructions.is_empty() {
            object.insert(
                "systemInstruction".to_string(),
                json!({"parts": [{"text": instructions.join("\n\n")}]}),
            );
        }
        if !tools.is_empty() {
            object.insert("tools".to_string(), json!([{"functionDeclarations": tools_to_gemini_spec(tools)}]));
        }

        let mut generation_config = Map::new();
        if let Some(temp) = self.config.temperature {
            generation_config.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(tokens));
        }
        if let Some(schema) = &options.response_schema {
            generation_config.insert("responseMimeType".to_string(), json!("application/json"));
            generation_config.insert("responseSchema".to_string(), to_gemini_schema(schema));
        }
        if !options.modalities.is_empty() {
            generation_config.insert("responseModalities".to_string(), json!(options.modalities));
        }
        if !generation_config.is_empty() {
            object.insert("generationConfig".to_string(), Value::Object(generation_config));
        }

        Value::Object(object)
    }

    async fn send(&self, method: &str, payload: &Value) -> ProviderResult<reqwest::Response> {
        let api_key = self.config.api_key()?;
        let url = format!(
            "{}/v1beta/models/{}:{}",
            self.config.host.trim_end_matches('/'),
            self.config.model,
            method
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status => Err(ProviderError::Http {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> ProviderResult<(Message, Usage)> {
        let payload = self.build_payload(system, messages, tools, options);
        let response: Value = self.send("generateContent", &payload).await?.json().await?;

        let message = gemini_response_to_message(&response)?;
        let usage = Self::get_usage(&response);
        Ok((message, usage))
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> ProviderResult<TextStream> {
        let payload = self.build_payload(system, messages, &[], options);
        let events = self
            .send("streamGenerateContent?alt=sse", &payload)
            .await?
            .bytes_stream()
            .eventsource();

        let stream = events.filter_map(|event| async move {
            match event {
                Ok(event) => gemini_stream_text(&event.data).transpose(),
                Err(e) => Some(Err(ProviderError::Response(format!(
                    "Stream interrupted: {}",
                    e
                )))),
            }
        });

        Ok(Box::pin(stream))
    }
}

/// Convert internal Message format to gemini `contents`, system messages are skipped
///
/// Consecutive tool messages answer the calls of one model turn, gemini wants all of
/// their function responses in a single user turn.
pub fn messages_to_gemini_spec(messages: &[Message]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::new();
    let mut previous_role = None;

    for message in messages {
        let role = match message.role {
            Role::System => continue,
            Role::Assistant => "model",
            Role::User | Role::Tool => "user",
        };

        let mut parts = Vec::new();
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        parts.push(json!({"text": text.text}));
                    }
                }
                MessageContent::File(file) => parts.push(json!({
                    "inlineData": {"mimeType": file.mime_type, "data": file.base64_data()}
                })),
                MessageContent::Image(image) => parts.push(json!({
                    "inlineData": {"mimeType": image.mime_type, "data": image.data}
                })),
                MessageContent::ToolRequest(request) => {
                    let (name, args) = match &request.tool_call {
                        Ok(call) => (call.name.as_str(), call.arguments.clone()),
                        Err(_) => (INVALID_TOOL_NAME, json!({})),
                    };
                    parts.push(json!({"functionCall": {"name": name, "args": args}}));
                }
                MessageContent::ToolResponse(response) => {
                    let body = match &response.tool_result {
                        Ok(output) => json!({"output": output}),
                        Err(_) => json!({"error": response.output_text()}),
                    };
                    parts.push(json!({
                        "functionResponse": {"name": response.name, "response": body}
                    }));
                }
            }
        }

        if parts.is_empty() {
            continue;
        }
        if message.role == Role::Tool && previous_role == Some(Role::Tool) {
            if let Some(grouped) = contents
                .last_mut()
                .and_then(|content| content["parts"].as_array_mut())
            {
                grouped.extend(parts);
                continue;
            }
        }
        contents.push(json!({"role": role, "parts": parts}));
        previous_role = Some(message.role);
    }

    contents
}

pub fn tools_to_gemini_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": to_gemini_schema(&tool.parameters),
            })
        })
        .collect()
}

/// Strip json schema keywords that the gemini api refuses
pub fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), to_gemini_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}

/// Convert a generateContent response into an assistant message
pub fn gemini_response_to_message(response: &Value) -> ProviderResult<Message> {
    if let Some(error) = response.get("error") {
        return Err(ProviderError::Response(format!("Gemini API error: {}", error)));
    }

    let Some(candidate) = response["candidates"].get(0) else {
        let reason = response["promptFeedback"]["blockReason"]
            .as_str()
            .unwrap_or("no candidates returned");
        return Err(ProviderError::Response(format!("Prompt rejected: {}", reason)));
    };

    let mut message = Message::assistant();
    let parts = candidate["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    for part in parts {
        if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
            message = message.with_text(text);
        } else if let Some(data) = part.get("inlineData") {
            let mime_type = data["mimeType"].as_str().unwrap_or("application/octet-stream");
            let encoded = data["data"].as_str().unwrap_or_default();
            message = message.with_image(mime_type, encoded);
        } else if let Some(call) = part.get("functionCall") {
            // gemini does not assign ids to function calls
            let id = format!("call_{}", uuid::Uuid::new_v4().simple());
            let name = call["name"].as_str().unwrap_or_default();
            let tool_call = if is_valid_function_name(name) {
                Ok(ToolCall::new(name, call.get("args").cloned().unwrap_or(json!({}))))
            } else {
                Err(AgentError::ToolNotFound(format!(
                    "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                    name
                )))
            };
            message = message.with_tool_request(id, tool_call);
        }
    }

    Ok(message)
}

/// Extract the text carried by one streamed response chunk
pub fn gemini_stream_text(data: &str) -> ProviderResult<Option<String>> {
    let chunk: Value = serde_json::from_str(data)
        .map_err(|e| ProviderError::Response(format!("Invalid stream chunk: {}", e)))?;
    if let Some(error) = chunk.get("error") {
        return Err(ProviderError::Response(error.to_string()));
    }

    let text: String = chunk["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}
