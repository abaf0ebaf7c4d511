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
use quill::prompt_template::{load_prompt_file, PDF_CHAT_PROMPT, SUMMARIZE_PDF_PROMPT};
use quill::schema::Schema;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct Summary {
    summary: String,
}

fn summary_schema() -> Schema {
    Schema::new(json!({
        "type": "object",
        "properties": {
            "summary": {
                "type": "string",
                "description": "A 50 word summary of the PDF."
            }
        },
        "required": ["summary"]
    }))
}

fn render(template: &str) -> Result<String, ApiError> {
    load_prompt_file(template, &json!({})).map_err(|e| ApiError::Internal(e.to_string()))
}

/// Answer a question about an uploaded document
async fn chat_with_pdf_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let upload = Upload::read(multipart?).await?;
    let question = upload.field("message").map(str::to_string);
    let (Some(file), Some(question)) = (upload.file, question) else {
        return Err(ApiError::BadRequest("Invalid input".to_string()));
    };

    let message = Message::user()
        .with_content(MessageContent::File(file))
        .with_text(question);
    let reply = state
        .gateway
        .generate_with_attachments(
            &render(PDF_CHAT_PROMPT)?,
            &[message],
            AttachmentKind::Document,
        )
        .await?;

    Ok(Json(json!({"success": true, "data": reply.text()})))
}

/// Summarize an uploaded document into `{ summary }`
async fn summarize_pdf_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let upload = Upload::read(multipart?).await?;
    let Some(file) = upload.file else {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    };
    tracing::info!(filename = ?file.filename, "Summarizing PDF");

    let message = Message::user()
        .with_text(render(SUMMARIZE_PDF_PROMPT)?)
        .with_content(MessageContent::File(file));
    let messages = [message];
    state
        .gateway
        .check_attachments(&messages, AttachmentKind::Document)?;
    let Summary { summary } = state
        .gateway
        .generate_structured("", &messages, &summary_schema())
        .await?;

    Ok(Json(json!({"success": true, "summary": summary})))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat-with-pdf", post(chat_with_pdf_handler))
        .route("/api/chat/summarize-pdf", post(summarize_pdf_handler))
        .with_state(state)
}
