// Export route modules
pub mod chat;
pub mod image;
pub mod pdf;
pub mod sentiment;
pub mod tools;
pub mod transcribe;

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Multipart};
use axum::routing::get;
use axum::Router;
use quill::models::content::FileContent;
use std::collections::HashMap;

/// Room for the multipart framing and text fields around the largest attachment
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    let limits = state.gateway.limits();
    let body_limit = limits.max_document_bytes.max(limits.max_audio_bytes) + BODY_LIMIT_HEADROOM;

    Router::new()
        .route("/status", get(status))
        .merge(chat::routes(state.clone()))
        .merge(pdf::routes(state.clone()))
        .merge(transcribe::routes(state.clone()))
        .merge(image::routes(state.clone()))
        .merge(sentiment::routes(state.clone()))
        .merge(tools::routes(state))
        .layer(DefaultBodyLimit::max(body_limit))
}

async fn status() -> &'static str {
    "ok"
}

/// The parts of a multipart upload: at most one file plus any text fields,
/// a second file part is rejected
#[derive(Debug, Default)]
pub struct Upload {
    pub file: Option<FileContent>,
    pub fields: HashMap<String, String>,
}

impl Upload {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut upload = Upload::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                if upload.file.is_some() {
                    return Err(ApiError::BadRequest(
                        "Only one file may be uploaded".to_string(),
                    ));
                }
                let filename = field.file_name().map(str::to_string);
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?;
                tracing::debug!(?filename, %mime_type, size = data.len(), "received upload");
                upload.file = Some(FileContent::new(mime_type, data.to_vec(), filename));
            } else {
                let value = field.text().await?;
                upload.fields.insert(name, value);
            }
        }
        Ok(upload)
    }

    /// A text field, `None` when absent or blank
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use quill::providers::mock::MockProvider;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_status() {
        let response = app(&MockProvider::default())
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app(&MockProvider::default())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_second_file_is_rejected() {
        let provider = MockProvider::default();
        let response = app(&provider)
            .oneshot(multipart_files_request(
                "/api/chat/transcribe",
                &[
                    ("a.mp3", "audio/mpeg", &[0xFF, 0xFB][..]),
                    ("b.mp3", "audio/mpeg", &[0xFF, 0xFB][..]),
                ],
                &[],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": "Only one file may be uploaded"})
        );
        assert!(provider.calls().is_empty());
    }
}
