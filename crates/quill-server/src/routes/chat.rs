use crate::error::{ApiError, INTERNAL_SERVER_ERROR};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use futures::Stream;
use quill::gateway::GatewayStream;
use quill::models::message::{Message, MessageContent};
use quill::models::role::Role;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};

// Types matching the incoming JSON structure
#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    role: Role,
    content: IncomingContent,
}

/// Clients send either a plain string or a list of typed parts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IncomingContent {
    Text(String),
    Parts(Vec<IncomingPart>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum IncomingPart {
    Text {
        text: String,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage {
    role: Role,
    content: Vec<OutgoingPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OutgoingPart {
    Text { text: String },
}

#[derive(Debug, Deserialize)]
struct PromptRequest {
    #[serde(default)]
    prompt: String,
}

// Convert incoming messages to our internal Message type
fn convert_messages(incoming: Vec<IncomingMessage>) -> Vec<Message> {
    incoming
        .into_iter()
        .map(|msg| {
            let message = Message::new(msg.role);
            match msg.content {
                IncomingContent::Text(text) => message.with_text(text),
                IncomingContent::Parts(parts) => {
                    parts.into_iter().fold(message, |message, part| match part {
                        IncomingPart::Text { text } => message.with_text(text),
                        IncomingPart::Unsupported => {
                            tracing::warn!("Ignoring unsupported message part");
                            message
                        }
                    })
                }
            }
        })
        .collect()
}

fn to_outgoing(message: &Message) -> OutgoingMessage {
    OutgoingMessage {
        role: message.role,
        content: message
            .content
            .iter()
            .filter_map(MessageContent::as_text)
            .map(|text| OutgoingPart::Text {
                text: text.to_string(),
            })
            .collect(),
    }
}

// Custom SSE response type that implements the Vercel AI SDK protocol
//
// Lines are produced as the body is polled, dropping the body drops the provider stream.
pub struct SseResponse {
    lines: BoxStream<'static, String>,
}

impl SseResponse {
    fn new(lines: BoxStream<'static, String>) -> Self {
        Self { lines }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.lines
            .as_mut()
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        (
            [
                (http::header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (http::header::CACHE_CONTROL, "no-cache"),
                (http::header::CONNECTION, "keep-alive"),
            ],
            [("x-vercel-ai-data-stream", "v1")],
            body,
        )
            .into_response()
    }
}

// Protocol-specific message formatting
struct ProtocolFormatter;

impl ProtocolFormatter {
    fn format_text(text: &str) -> String {
        let encoded_text = serde_json::to_string(text).unwrap_or_else(|_| String::new());
        format!("0:{}\n", encoded_text)
    }

    fn format_error(message: &str) -> String {
        // Errors start with "3:"
        let encoded = serde_json::to_string(message).unwrap_or_else(|_| String::new());
        format!("3:{}\n", encoded)
    }

    fn format_finish(reason: &str) -> String {
        // Finish messages start with "d:"
        let finish = json!({
            "finishReason": reason,
            "usage": {
                "promptTokens": 0,
                "completionTokens": 0
            }
        });
        format!("d:{}\n", finish)
    }
}

async fn generate_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }

    let messages = convert_messages(request.messages);
    let reply = state.gateway.generate("", &messages).await?;

    Ok(Json(json!({
        "success": true,
        "messages": [to_outgoing(&reply)],
    })))
}

/// Protocol lines for a text stream: one text line per fragment, then a finish line.
/// The first error ends the stream with an error line and an `error` finish.
fn protocol_lines(fragments: GatewayStream) -> BoxStream<'static, String> {
    stream::unfold(Some(fragments), |state| async move {
        let mut fragments = state?;
        match fragments.next().await {
            Some(Ok(chunk)) => Some((ProtocolFormatter::format_text(&chunk), Some(fragments))),
            Some(Err(e)) => {
                tracing::error!("Error processing text stream: {}", e);
                let lines = ProtocolFormatter::format_error(INTERNAL_SERVER_ERROR)
                    + &ProtocolFormatter::format_finish("error");
                Some((lines, None))
            }
            None => Some((ProtocolFormatter::format_finish("stop"), None)),
        }
    })
    .boxed()
}

async fn stream_handler(
    State(state): State<AppState>,
    payload: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<SseResponse, ApiError> {
    let Json(request) = payload?;
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("Prompt is required".to_string()));
    }

    // the status line is already 200 for the client, failures are reported in the stream
    let lines = match state.gateway.generate_streaming(&request.prompt).await {
        Ok(fragments) => protocol_lines(fragments),
        Err(e) => {
            tracing::error!("Failed to start text stream: {}", e);
            stream::iter([
                ProtocolFormatter::format_error(INTERNAL_SERVER_ERROR),
                ProtocolFormatter::format_finish("error"),
            ])
            .boxed()
        }
    };

    Ok(SseResponse::new(lines))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(generate_handler))
        .route("/api/chat/stream-text", post(stream_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::*;
    use axum::http::StatusCode;
    use quill::providers::mock::{MockFailure, MockProvider};
    use tower::ServiceExt;

    #[test]
    fn test_protocol_lines() {
        assert_eq!(ProtocolFormatter::format_text("Hi \"there\"\n"), "0:\"Hi \\\"there\\\"\\n\"\n");
        assert_eq!(ProtocolFormatter::format_error("boom"), "3:\"boom\"\n");
        assert!(ProtocolFormatter::format_finish("stop").starts_with("d:{\"finishReason\":\"stop\""));
    }

    #[test]
    fn test_convert_messages() {
        let incoming: Vec<IncomingMessage> = serde_json::from_value(json!([
            {"role": "user", "content": "Hi"},
            {"role": "assistant", "content": [{"type": "text", "text": "Hello"}, {"type": "reasoning", "text": "hm"}]},
        ]))
        .unwrap();

        let messages = convert_messages(incoming);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text(), "Hi");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].text(), "Hello");
    }

    #[tokio::test]
    async fn test_generate() {
        let provider = replying("Hello! How can I help?");
        let response = app(&provider)
            .oneshot(json_request(
                "/api/chat",
                json!({"messages": [{"role": "user", "content": "Hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["messages"][0]["role"], "assistant");
        assert_eq!(
            body["messages"][0]["content"][0],
            json!({"type": "text", "text": "Hello! How can I help?"})
        );
        assert_eq!(provider.calls()[0].messages[0].text(), "Hi");
    }

    #[tokio::test]
    async fn test_generate_requires_messages() {
        let response = app(&MockProvider::default())
            .oneshot(json_request("/api/chat", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body, json!({"success": false, "error": "Message is required"}));
    }

    #[tokio::test]
    async fn test_generate_rejects_malformed_json() {
        let response = app(&MockProvider::default())
            .oneshot(json_request("/api/chat", json!({"messages": "nope"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_generate_hides_provider_errors() {
        let provider = MockProvider::failing(MockFailure::Auth("No Google API key found".into()));
        let response = app(&provider)
            .oneshot(json_request(
                "/api/chat",
                json!({"messages": [{"role": "user", "content": "Hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": "Internal Server Error"})
        );
    }

    #[tokio::test]
    async fn test_stream_text() {
        let provider = replying("one two three");
        let response = app(&provider)
            .oneshot(json_request("/api/chat/stream-text", json!({"prompt": "count"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-vercel-ai-data-stream"], "v1");
        let body = body_text(response).await;
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[..3], ["0:\"one \"", "0:\"two \"", "0:\"three\""]);
        assert!(lines[3].starts_with("d:{\"finishReason\":\"stop\""));
    }

    #[tokio::test]
    async fn test_stream_text_reports_errors_in_band() {
        let provider = MockProvider::failing(MockFailure::Call("upstream 503".into()));
        let response = app(&provider)
            .oneshot(json_request("/api/chat/stream-text", json!({"prompt": "count"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.starts_with("3:\"Internal Server Error\"\n"));
        assert!(body.contains("\"finishReason\":\"error\""));
        assert!(!body.contains("upstream 503"));
    }

    #[tokio::test]
    async fn test_protocol_lines_stop_at_first_error() {
        let fragments: GatewayStream = stream::iter(vec![
            Ok("partial ".to_string()),
            Err(quill::errors::GatewayError::ProviderCall("connection reset".into())),
            Ok("never sent".to_string()),
        ])
        .boxed();

        let lines: Vec<String> = protocol_lines(fragments).collect().await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "0:\"partial \"\n");
        assert!(lines[1].starts_with("3:\"Internal Server Error\"\nd:{\"finishReason\":\"error\""));
    }

    #[tokio::test]
    async fn test_stream_text_requires_prompt() {
        let response = app(&MockProvider::default())
            .oneshot(json_request("/api/chat/stream-text", json!({"prompt": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
