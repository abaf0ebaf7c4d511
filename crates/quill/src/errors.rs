use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::errors::ProviderError;

/// Errors raised while resolving or running a single tool call. These never abort
/// the agent loop, they are rendered into the tool result so the model can react.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Errors surfaced by the model gateway to its callers
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider credentials missing: {0}")]
    ProviderAuth(String),

    #[error("Provider call failed: {0}")]
    ProviderCall(String),

    #[error("Structured output failed validation: {0}")]
    SchemaValidation(String),

    #[error("Attachment {filename} is {size} bytes, the limit is {limit} bytes")]
    PayloadTooLarge {
        filename: String,
        size: usize,
        limit: usize,
    },

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Auth(msg) => GatewayError::ProviderAuth(msg),
            other => GatewayError::ProviderCall(other.to_string()),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
