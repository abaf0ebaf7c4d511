use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use quill::models::message::Message;
use quill::prompt_template::{load_prompt_file, SENTIMENT_PROMPT};
use quill::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Deserialize)]
struct Classification {
    sentiment: Sentiment,
}

#[derive(Debug, Deserialize)]
struct SentimentRequest {
    #[serde(default)]
    text: String,
}

fn sentiment_schema() -> Schema {
    Schema::new(json!({
        "type": "object",
        "description": "Classify the sentiment of the text.",
        "properties": {
            "sentiment": {
                "type": "string",
                "enum": ["positive", "negative", "neutral"],
                "description": "The sentiment of the text."
            }
        },
        "required": ["sentiment"]
    }))
}

async fn classify_handler(
    State(state): State<AppState>,
    payload: Result<Json<SentimentRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Text is required".to_string()));
    }

    let prompt = load_prompt_file(SENTIMENT_PROMPT, &json!({"text": request.text}))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let Classification { sentiment } = state
        .gateway
        .generate_structured("", &[Message::user().with_text(prompt)], &sentiment_schema())
        .await?;

    Ok(Json(json!({"success": true, "sentiment": sentiment})))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/classify-sentiment", post(classify_handler))
        .with_state(state)
}
