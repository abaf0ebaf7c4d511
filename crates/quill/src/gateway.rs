//! The gateway is the single entry point the request handlers use to reach a model.
//!
//! It wraps a [`Provider`] and offers one method per generation mode: plain text,
//! streamed text, schema-validated structured output, replies over attached files
//! and image generation. Attachment limits are enforced here, before any request
//! leaves the process.
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::errors::{GatewayError, GatewayResult};
use crate::models::content::{FileContent, ImageContent};
use crate::models::message::Message;
use crate::providers::base::{CompletionOptions, Modality, Provider};
use crate::schema::Schema;

pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Reason reported when the model answered without text and without images
pub const NO_IMAGES_GENERATED: &str = "No images were generated";

/// Text fragments as they arrive from the provider
pub type GatewayStream = BoxStream<'static, GatewayResult<String>>;

/// Size and type restrictions applied to attached files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentLimits {
    pub max_document_bytes: usize,
    pub max_audio_bytes: usize,
    pub document_mime_types: Vec<String>,
    pub audio_mime_types: Vec<String>,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            document_mime_types: vec!["application/pdf".to_string(), "text/plain".to_string()],
            audio_mime_types: [
                "audio/mpeg",
                "audio/mp3",
                "audio/wav",
                "audio/x-wav",
                "audio/webm",
                "audio/ogg",
                "audio/flac",
                "audio/aac",
                "audio/mp4",
                "audio/x-m4a",
            ]
            .iter()
            .map(|mime| mime.to_string())
            .collect(),
        }
    }
}

/// The class of file a request accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Document,
    Audio,
}

impl AttachmentLimits {
    fn rules(&self, kind: AttachmentKind) -> (&[String], usize) {
        match kind {
            AttachmentKind::Document => (self.document_mime_types.as_slice(), self.max_document_bytes),
            AttachmentKind::Audio => (self.audio_mime_types.as_slice(), self.max_audio_bytes),
        }
    }

    /// The class a file's mime type belongs to, if any
    pub fn kind_of(&self, file: &FileContent) -> Option<AttachmentKind> {
        let mime_type = essence(&file.mime_type);
        [AttachmentKind::Audio, AttachmentKind::Document]
            .into_iter()
            .find(|kind| {
                self.rules(*kind)
                    .0
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(&mime_type))
            })
    }

    /// Fail unless the file is of `kind` and within the size limit of that class
    pub fn check(&self, kind: AttachmentKind, file: &FileContent) -> GatewayResult<()> {
        if self.kind_of(file) != Some(kind) {
            return Err(GatewayError::UnsupportedMediaType(file.mime_type.clone()));
        }

        let (_, limit) = self.rules(kind);
        if file.len() > limit {
            return Err(GatewayError::PayloadTooLarge {
                filename: file
                    .filename
                    .clone()
                    .unwrap_or_else(|| "attachment".to_string()),
                size: file.len(),
                limit,
            });
        }
        Ok(())
    }
}

/// The mime type without parameters, `audio/webm; codecs=opus` becomes `audio/webm`
fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Outcome of an image generation request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ImageGeneration {
    Success { images: Vec<ImageContent> },
    Failure { reason: String },
}

impl ImageGeneration {
    /// Decide whether a reply to an image request succeeded.
    ///
    /// Any non-blank text is read as a refusal or explanation and becomes the
    /// failure reason, even when images came along with it. A blank reply
    /// without images is also a failure.
    pub fn classify(message: &Message) -> Self {
        let text = message.text();
        if !text.trim().is_empty() {
            return ImageGeneration::Failure { reason: text };
        }

        let images = message.images();
        if images.is_empty() {
            ImageGeneration::Failure {
                reason: NO_IMAGES_GENERATED.to_string(),
            }
        } else {
            ImageGeneration::Success { images }
        }
    }
}

/// Provider agnostic access to a model
#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn Provider>,
    limits: AttachmentLimits,
}

impl Gateway {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            limits: AttachmentLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: AttachmentLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The underlying provider, shared with agents built on top of the gateway
    pub fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.provider)
    }

    pub fn limits(&self) -> &AttachmentLimits {
        &self.limits
    }

    /// Single completion over a conversation
    pub async fn generate(&self, system: &str, messages: &[Message]) -> GatewayResult<Message> {
        self.complete(system, messages, &CompletionOptions::default())
            .await
    }

    /// Single completion for one user prompt, returning only the text
    pub async fn generate_text(&self, prompt: &str) -> GatewayResult<String> {
        let messages = [user_prompt(prompt)?];
        Ok(self.generate("", &messages).await?.text())
    }

    /// Stream the reply to one user prompt
    pub async fn generate_streaming(&self, prompt: &str) -> GatewayResult<GatewayStream> {
        let messages = [user_prompt(prompt)?];
        let stream = self
            .provider
            .stream("", &messages, &CompletionOptions::default())
            .await?;
        Ok(stream.map_err(GatewayError::from).boxed())
    }

    /// Ask for json matching `schema`, validate it and deserialize it into `T`
    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        system: &str,
        messages: &[Message],
        schema: &Schema,
    ) -> GatewayResult<T> {
        // any accepted class, callers narrow it with check_attachments
        for file in messages.iter().flat_map(|m| m.files()) {
            let kind = self
                .limits
                .kind_of(file)
                .ok_or_else(|| GatewayError::UnsupportedMediaType(file.mime_type.clone()))?;
            self.limits.check(kind, file)?;
        }
        let options = CompletionOptions::structured(schema.as_value().clone());
        let reply = self.complete(system, messages, &options).await?;

        let text = reply.text();
        let value: Value = serde_json::from_str(strip_json_fence(&text)).map_err(|e| {
            GatewayError::SchemaValidation(format!("reply is not valid json: {}", e))
        })?;
        schema
            .validate(&value)
            .map_err(|e| GatewayError::SchemaValidation(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| GatewayError::SchemaValidation(e.to_string()))
    }

    /// Like [`Gateway::generate`] but at least one message must carry a file,
    /// and every file must be of `kind`
    pub async fn generate_with_attachments(
        &self,
        system: &str,
        messages: &[Message],
        kind: AttachmentKind,
    ) -> GatewayResult<Message> {
        if messages.iter().all(|m| m.files().next().is_none()) {
            return Err(GatewayError::InvalidInput(
                "At least one attachment is required".to_string(),
            ));
        }
        self.check_attachments(messages, kind)?;
        self.generate(system, messages).await
    }

    /// Request text and image output for a prompt and classify the reply
    pub async fn generate_images(&self, prompt: &str) -> GatewayResult<ImageGeneration> {
        let messages = [user_prompt(prompt)?];
        let options = CompletionOptions::with_modalities(vec![Modality::Text, Modality::Image]);
        let reply = self.complete("", &messages, &options).await?;
        Ok(ImageGeneration::classify(&reply))
    }

    /// Check every attached file against the limits of `kind` without calling the model
    pub fn check_attachments(
        &self,
        messages: &[Message],
        kind: AttachmentKind,
    ) -> GatewayResult<()> {
        messages
            .iter()
            .flat_map(|m| m.files())
            .try_for_each(|file| self.limits.check(kind, file))
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> GatewayResult<Message> {
        if messages.is_empty() {
            return Err(GatewayError::InvalidInput(
                "At least one message is required".to_string(),
            ));
        }
        let (reply, usage) = self
            .provider
            .complete(system, messages, &[], options)
            .await?;
        tracing::debug!(
            input_tokens = ?usage.input_tokens,
            output_tokens = ?usage.output_tokens,
            "completion finished"
        );
        Ok(reply)
    }
}

fn user_prompt(prompt: &str) -> GatewayResult<Message> {
    if prompt.trim().is_empty() {
        return Err(GatewayError::InvalidInput("Prompt is required".to_string()));
    }
    Ok(Message::user().with_text(prompt))
}

/// Some models wrap json replies in a markdown code fence even in json mode
fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
