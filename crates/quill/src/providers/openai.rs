use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{CompletionOptions, Provider, TextStream, Usage};
use super::configs::OpenAiProviderConfig;
use super::errors::{ProviderError, ProviderResult};
use super::utils::{
    check_openai_context_length_error, messages_to_openai_spec, openai_response_to_message,
    openai_stream_delta, system_message, tools_to_openai_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-4o";

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let Some(usage) = data.get("usage") else {
            return Usage::default();
        };

        let input_tokens = usage
            .get("prompt_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let output_tokens = usage
            .get("completion_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let total_tokens = usage
            .get("total_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });

        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    fn build_payload(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> ProviderResult<Value> {
        if options.wants_images() {
            return Err(ProviderError::Unsupported(
                "image output is not available on the chat completions api".to_string(),
            ));
        }

        // create messages array with system message first
        let mut messages_array: Vec<Value> = system_message(system).into_iter().collect();
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array
        });

        // Add optional parameters
        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_openai_spec(tools)?);
        }
        if let Some(schema) = &options.response_schema {
            payload["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {"name": "response", "schema": schema}
            });
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }

        Ok(payload)
    }

    async fn send(&self, payload: &Value) -> ProviderResult<reqwest::Response> {
        let api_key = self.config.api_key()?;
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status => {
                let body = response.text().await.unwrap_or_default();
                if let Some(err) = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|v| check_openai_context_length_error(&v["error"]))
                {
                    return Err(err);
                }
                Err(ProviderError::Http { status, body })
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> ProviderResult<(Message, Usage)> {
        let payload = self.build_payload(system, messages, tools, options)?;
        let response: Value = self.send(&payload).await?.json().await?;

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err);
            }
            return Err(ProviderError::Response(format!("OpenAI API error: {}", error)));
        }

        let message = openai_response_to_message(response.clone())?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> ProviderResult<TextStream> {
        let mut payload = self.build_payload(system, messages, &[], options)?;
        payload["stream"] = json!(true);

        let events = self.send(&payload).await?.bytes_stream().eventsource();

        let stream = events.filter_map(|event| async move {
            match event {
                Ok(event) if event.data == "[DONE]" => None,
                Ok(event) => openai_stream_delta(&event.data).transpose(),
                Err(e) => Some(Err(ProviderError::Response(format!(
                    "Stream interrupted: {}",
                    e
                )))),
            }
        });

        Ok(Box::pin(stream))
    }
}
