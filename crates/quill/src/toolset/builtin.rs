//! Tools offered by the tool-calling routes
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ToolHandler;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;

pub const WEATHER_TOOL_NAME: &str = "getWeather";
pub const CONSOLE_LOG_TOOL_NAME: &str = "logToConsole";

fn parse_arguments<T: for<'de> Deserialize<'de>>(arguments: Value) -> AgentResult<T> {
    serde_json::from_value(arguments).map_err(|e| AgentError::InvalidParameters(e.to_string()))
}

#[derive(Deserialize)]
struct WeatherArguments {
    city: String,
}

/// Reports a canned weather observation for a city
pub struct WeatherTool {
    tool: Tool,
}

impl WeatherTool {
    pub fn new() -> Self {
        let tool = Tool::new(
            WEATHER_TOOL_NAME,
            "Get the current weather for a given city.",
            json!({
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "The city to get the weather for."
                    }
                },
                "required": ["city"]
            }),
        );
        Self { tool }
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<String> {
        let WeatherArguments { city } = parse_arguments(arguments)?;
        Ok(format!(
            "The current weather in {} is sunny with a temperature of 25°C.",
            city
        ))
    }
}

#[derive(Deserialize)]
struct ConsoleLogArguments {
    message: String,
}

/// Writes a message to the server log
pub struct ConsoleLogTool {
    tool: Tool,
}

impl ConsoleLogTool {
    pub fn new() -> Self {
        let tool = Tool::new(
            CONSOLE_LOG_TOOL_NAME,
            "Logs a message to the console.",
            json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The message to log to the console."
                    }
                },
                "required": ["message"]
            }),
        );
        Self { tool }
    }
}

impl Default for ConsoleLogTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for ConsoleLogTool {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<String> {
        let ConsoleLogArguments { message } = parse_arguments(arguments)?;
        tracing::info!(tool = CONSOLE_LOG_TOOL_NAME, "{}", message);
        Ok(format!("Logged to console: {}", message))
    }
}
