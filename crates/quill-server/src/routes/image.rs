use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use quill::gateway::ImageGeneration;
use quill::prompt_template::{load_prompt_file, IMAGE_GENERATION_PROMPT};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct ImageRequest {
    #[serde(default)]
    prompt: String,
}

async fn image_generation_handler(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("Prompt is required".to_string()));
    }

    let prompt = load_prompt_file(IMAGE_GENERATION_PROMPT, &json!({"prompt": request.prompt}))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    // a refusal is still a 200, it is reported in the body
    let body = match state.gateway.generate_images(&prompt).await? {
        ImageGeneration::Success { images } => json!({
            "success": true,
            "data": images,
            "message": "Images generated successfully",
        }),
        ImageGeneration::Failure { reason } => {
            tracing::info!(%reason, "No images generated");
            json!({"success": false, "error": reason, "data": []})
        }
    };
    Ok(Json(body))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/image-generation", post(image_generation_handler))
        .with_state(state)
}
