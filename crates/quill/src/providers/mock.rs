use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::base::{CompletionOptions, Provider, TextStream, Usage};
use super::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// What the mock should do once its queued responses run out, or instead of answering
#[derive(Debug, Clone)]
pub enum MockFailure {
    Auth(String),
    Call(String),
}

impl MockFailure {
    fn to_error(&self) -> ProviderError {
        match self {
            MockFailure::Auth(msg) => ProviderError::Auth(msg.clone()),
            MockFailure::Call(msg) => ProviderError::Response(msg.clone()),
        }
    }
}

/// One request received by the mock, kept so tests can assert on what was sent
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub options: CompletionOptions,
}

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Message>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    failure: Option<MockFailure>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            ..Default::default()
        }
    }

    /// A provider whose every call fails
    pub fn failing(failure: MockFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Default::default()
        }
    }

    /// Every request received so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().expect("mock calls lock").clone()
    }

    fn record(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> ProviderResult<Message> {
        self.calls.lock().expect("mock calls lock").push(MockCall {
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            options: options.clone(),
        });

        if let Some(failure) = &self.failure {
            return Err(failure.to_error());
        }

        let mut responses = self.responses.lock().expect("mock responses lock");
        // Return empty response if no more pre-configured responses
        Ok(responses
            .pop_front()
            .unwrap_or_else(|| Message::assistant().with_text("")))
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> ProviderResult<(Message, Usage)> {
        let message = self.record(system, messages, tools, options)?;
        Ok((message, Usage::default()))
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> ProviderResult<TextStream> {
        let text = self.record(system, messages, &[], options)?.text();
        // split after each space so the chunks concatenate back to the original text
        let chunks: Vec<ProviderResult<String>> = text
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}
