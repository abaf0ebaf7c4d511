use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use quill::agent::{Agent, AgentRun, AgentStep};
use quill::models::message::Message;
use quill::providers::utils::INVALID_TOOL_NAME;
use quill::toolset::builtin::{ConsoleLogTool, WeatherTool};
use quill::toolset::{ToolHandler, Toolset};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const TOOLS_SYSTEM_PROMPT: &str = "You are an AI code reviewer.";

#[derive(Debug, Deserialize)]
struct ToolsRequest {
    #[serde(default)]
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallView {
    id: String,
    name: String,
    arguments: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultView {
    id: String,
    name: String,
    output: String,
    is_error: bool,
}

/// What a client sees of one agent step
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepView {
    index: usize,
    text: String,
    tool_calls: Vec<ToolCallView>,
    tool_results: Vec<ToolResultView>,
}

impl From<&AgentStep> for StepView {
    fn from(step: &AgentStep) -> Self {
        let tool_calls = step
            .tool_requests
            .iter()
            .map(|request| match &request.tool_call {
                Ok(call) => ToolCallView {
                    id: request.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
                Err(_) => ToolCallView {
                    id: request.id.clone(),
                    name: INVALID_TOOL_NAME.to_string(),
                    arguments: json!({}),
                },
            })
            .collect();
        let tool_results = step
            .tool_responses
            .iter()
            .map(|response| ToolResultView {
                id: response.id.clone(),
                name: response.name.clone(),
                output: response.output_text(),
                is_error: response.tool_result.is_err(),
            })
            .collect();

        Self {
            index: step.index,
            text: step.response.text(),
            tool_calls,
            tool_results,
        }
    }
}

fn run_body(run: &AgentRun) -> Value {
    let steps: Vec<StepView> = run.steps.iter().map(StepView::from).collect();
    json!({
        "success": true,
        "data": run.text,
        "steps": steps,
    })
}

async fn run_agent<H: ToolHandler + 'static>(
    state: &AppState,
    tool: H,
    max_steps: usize,
    prompt: &str,
) -> Result<Json<Value>, ApiError> {
    if prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("Prompt is required".to_string()));
    }

    let toolset = Toolset::new()
        .with(tool)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let agent = Agent::new(state.gateway.provider())
        .with_system_prompt(TOOLS_SYSTEM_PROMPT)
        .with_tools(toolset)
        .with_max_steps(max_steps);

    let run = agent.run(&[Message::user().with_text(prompt)]).await?;
    tracing::debug!(steps = run.steps.len(), outcome = ?run.outcome, "agent run finished");
    Ok(Json(run_body(&run)))
}

/// Ask about the weather, the model may call `getWeather` before answering
async fn weather_handler(
    State(state): State<AppState>,
    payload: Result<Json<ToolsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    run_agent(&state, WeatherTool::new(), state.max_steps, &request.prompt).await
}

/// Let the model log a message; a single round trip, the tool result is not sent back
async fn log_handler(
    State(state): State<AppState>,
    payload: Result<Json<ToolsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    run_agent(&state, ConsoleLogTool::new(), 1, &request.prompt).await
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/tools/weather", post(weather_handler))
        .route("/api/tools/log", post(log_handler))
        .with_state(state)
}
