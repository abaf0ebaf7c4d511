use super::content::{FileContent, ImageContent, TextContent};
use super::role::Role;
use super::tool::ToolCall;
use crate::errors::AgentResult;
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub tool_call: AgentResult<ToolCall>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolResponse {
    pub id: String,
    /// Name of the tool that was requested, some providers correlate results by name
    pub name: String,
    pub tool_result: AgentResult<String>,
}

impl ToolResponse {
    /// The text handed back to the model, errors included so it can correct itself
    pub fn output_text(&self) -> String {
        match &self.tool_result {
            Ok(output) => output.clone(),
            Err(e) => format!("The tool call returned the following error:\n{}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(TextContent),
    File(FileContent),
    Image(ImageContent),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn file<M: Into<String>>(mime_type: M, data: Vec<u8>, filename: Option<String>) -> Self {
        MessageContent::File(FileContent::new(mime_type, data, filename))
    }

    pub fn image<M: Into<String>, D: Into<String>>(mime_type: M, data: D) -> Self {
        MessageContent::Image(ImageContent::new(mime_type, data))
    }

    pub fn tool_request<S: Into<String>>(id: S, tool_call: AgentResult<ToolCall>) -> Self {
        MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            tool_call,
        })
    }

    pub fn tool_response<S: Into<String>, N: Into<String>>(
        id: S,
        name: N,
        tool_result: AgentResult<String>,
    ) -> Self {
        MessageContent::ToolResponse(ToolResponse {
            id: id.into(),
            name: name.into(),
            tool_result,
        })
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref tool_request) = self {
            Some(tool_request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileContent> {
        match self {
            MessageContent::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageContent> {
        match self {
            MessageContent::Image(image) => Some(image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Create an empty message for the given role with the current timestamp
    pub fn new(role: Role) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    pub fn system() -> Self {
        Self::new(Role::System)
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create a new tool message, which carries tool results back to the model
    pub fn tool() -> Self {
        Self::new(Role::Tool)
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Attach a file to the message
    pub fn with_file<M: Into<String>>(
        self,
        mime_type: M,
        data: Vec<u8>,
        filename: Option<String>,
    ) -> Self {
        self.with_content(MessageContent::file(mime_type, data, filename))
    }

    /// Add image content to the message
    pub fn with_image<M: Into<String>, D: Into<String>>(self, mime_type: M, data: D) -> Self {
        self.with_content(MessageContent::image(mime_type, data))
    }

    /// Add a tool request to the message
    pub fn with_tool_request<S: Into<String>>(
        self,
        id: S,
        tool_call: AgentResult<ToolCall>,
    ) -> Self {
        self.with_content(MessageContent::tool_request(id, tool_call))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<S: Into<String>, N: Into<String>>(
        self,
        id: S,
        name: N,
        result: AgentResult<String>,
    ) -> Self {
        self.with_content(MessageContent::tool_response(id, name, result))
    }

    /// All text parts joined together, empty when the message carries no text
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|content| content.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content
            .iter()
            .filter_map(|content| content.as_tool_request())
            .collect()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileContent> {
        self.content.iter().filter_map(|content| content.as_file())
    }

    pub fn images(&self) -> Vec<ImageContent> {
        self.content
            .iter()
            .filter_map(|content| content.as_image().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use serde_json::json;

    #[test]
    fn test_text_joins_only_text_parts() {
        let message = Message::assistant()
            .with_text("Hello, ")
            .with_tool_request("1", Ok(ToolCall::new("getWeather", json!({"city": "Lahore"}))))
            .with_text("world");

        assert_eq!(message.text(), "Hello, world");
        assert_eq!(message.tool_requests().len(), 1);
    }

    #[test]
    fn test_tool_response_output_text_includes_error() {
        let ok = ToolResponse {
            id: "1".into(),
            name: "getWeather".into(),
            tool_result: Ok("sunny".into()),
        };
        assert_eq!(ok.output_text(), "sunny");

        let err = ToolResponse {
            id: "2".into(),
            name: "getWeather".into(),
            tool_result: Err(AgentError::InvalidParameters("city is required".into())),
        };
        assert_eq!(
            err.output_text(),
            "The tool call returned the following error:\nInvalid parameters: city is required"
        );
    }

    #[test]
    fn test_files_and_images_are_collected() {
        let message = Message::user()
            .with_text("What is the total?")
            .with_file("application/pdf", vec![1, 2, 3], Some("invoice.pdf".into()))
            .with_image("image/png", "AAAA");

        assert_eq!(message.files().count(), 1);
        assert_eq!(message.images(), vec![ImageContent::new("image/png", "AAAA")]);
    }
}
