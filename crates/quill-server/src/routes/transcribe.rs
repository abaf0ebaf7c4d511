use super::Upload;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use quill::gateway::AttachmentKind;
use quill::models::message::{Message, MessageContent};
use quill::prompt_template::{load_prompt_file, TRANSCRIBE_PROMPT};
use serde_json::{json, Value};

/// Transcribe an uploaded audio file, the reply is the transcript only
async fn transcribe_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let upload = Upload::read(multipart?).await?;
    let Some(file) = upload.file else {
        return Err(ApiError::BadRequest("No audio file provided".to_string()));
    };
    tracing::info!(filename = ?file.filename, "Transcribing audio file");

    let instruction =
        load_prompt_file(TRANSCRIBE_PROMPT, &json!({})).map_err(|e| ApiError::Internal(e.to_string()))?;
    let message = Message::user()
        .with_text(instruction)
        .with_content(MessageContent::File(file));
    let reply = state
        .gateway
        .generate_with_attachments("", &[message], AttachmentKind::Audio)
        .await?;

    Ok(Json(json!({"success": true, "data": reply.text()})))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/transcribe", post(transcribe_handler))
        .with_state(state)
}
