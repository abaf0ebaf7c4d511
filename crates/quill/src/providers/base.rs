use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use super::errors::ProviderResult;
use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Output modalities a completion may produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
}

/// Per-call knobs that are not part of the provider configuration
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// JSON schema the reply must conform to, enables the provider's json mode
    pub response_schema: Option<Value>,
    /// Requested output modalities, empty means the provider default (text)
    pub modalities: Vec<Modality>,
}

impl CompletionOptions {
    pub fn structured(schema: Value) -> Self {
        Self {
            response_schema: Some(schema),
            ..Default::default()
        }
    }

    pub fn with_modalities(modalities: Vec<Modality>) -> Self {
        Self {
            modalities,
            ..Default::default()
        }
    }

    pub fn wants_images(&self) -> bool {
        self.modalities.contains(&Modality::Image)
    }
}

/// A lazy, single pass sequence of text fragments
pub type TextStream = BoxStream<'static, ProviderResult<String>>;

/// Base trait for AI providers (Gemini, OpenAI, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message using the configured model
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> ProviderResult<(Message, Usage)>;

    /// Generate the next message as a stream of text fragments
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> ProviderResult<TextStream>;
}
