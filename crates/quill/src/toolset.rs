use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};
use crate::schema::Schema;

pub mod builtin;

/// A callback the model may invoke, together with its declaration
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The declaration sent to the model
    fn tool(&self) -> &Tool;

    /// Run the tool with arguments that already passed schema validation
    async fn call(&self, arguments: Value) -> AgentResult<String>;
}

/// A tool backed by an async closure
pub struct FnTool<F> {
    tool: Tool,
    handler: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = AgentResult<String>> + Send,
{
    pub fn new(tool: Tool, handler: F) -> Self {
        Self { tool, handler }
    }
}

#[async_trait]
impl<F, Fut> ToolHandler for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = AgentResult<String>> + Send,
{
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<String> {
        (self.handler)(arguments).await
    }
}

/// The tools offered to the model for one call, in declaration order
#[derive(Clone, Default)]
pub struct Toolset {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl Toolset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, names must be unique within a toolset
    pub fn register<H: ToolHandler + 'static>(&mut self, handler: H) -> AgentResult<()> {
        let name = &handler.tool().name;
        if self.get(name).is_some() {
            return Err(AgentError::Internal(format!("Duplicate tool name: {}", name)));
        }
        self.handlers.push(Arc::new(handler));
        Ok(())
    }

    /// Builder flavour of [`Toolset::register`]
    pub fn with<H: ToolHandler + 'static>(mut self, handler: H) -> AgentResult<Self> {
        self.register(handler)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.iter().find(|h| h.tool().name == name)
    }

    /// Declarations for every registered tool
    pub fn tools(&self) -> Vec<Tool> {
        self.handlers.iter().map(|h| h.tool().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Resolve, validate and run a single tool call
    pub async fn dispatch(&self, tool_call: &ToolCall) -> AgentResult<String> {
        let handler = self
            .get(&tool_call.name)
            .ok_or_else(|| AgentError::ToolNotFound(tool_call.name.clone()))?;

        Schema::new(handler.tool().parameters.clone())
            .validate(&tool_call.arguments)
            .map_err(|e| AgentError::InvalidParameters(e.to_string()))?;

        handler.call(tool_call.arguments.clone()).await
    }
}

impl std::fmt::Debug for Toolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| &h.tool().name))
            .finish()
    }
}
