use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    /// No usable credential was configured for the provider
    #[error("{0}")]
    Auth(String),

    #[error("Request to provider failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Context length exceeded. Message: {0}")]
    ContextLengthExceeded(String),

    #[error("Unexpected provider response: {0}")]
    Response(String),

    #[error("Unsupported by this provider: {0}")]
    Unsupported(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
