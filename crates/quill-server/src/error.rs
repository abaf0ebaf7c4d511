use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use quill::errors::GatewayError;
use quill::providers::errors::ProviderError;
use serde_json::json;
use thiserror::Error;

/// Problems found while loading settings at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a dotted configuration key to the environment variable that sets it,
/// `provider.api_key` becomes `QUILL_PROVIDER__API_KEY`
pub fn to_env_var(field_path: &str) -> String {
    const SECTIONS: [&str; 4] = ["server.", "provider.", "limits.", "agent."];
    // serde reports fields missing inside the tagged provider table without their section
    let normalized_path = if SECTIONS.iter().any(|s| field_path.starts_with(s)) {
        field_path.to_string()
    } else {
        format!("provider.{}", field_path)
    };

    format!("QUILL_{}", normalized_path.replace('.', "__").to_uppercase())
}

pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// A failed request, rendered as `{ "success": false, "error": ... }`
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    /// Logged with its detail, reported to the client as a generic message
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidInput(msg) => ApiError::BadRequest(msg),
            err @ GatewayError::PayloadTooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            GatewayError::UnsupportedMediaType(mime) => {
                ApiError::UnsupportedMediaType(format!("Unsupported media type: {}", mime))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                INTERNAL_SERVER_ERROR.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({"success": false, "error": message}))).into_response()
    }
}
