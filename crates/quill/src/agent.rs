use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde::Serialize;
use std::sync::Arc;

use crate::models::message::{Message, ToolRequest, ToolResponse};
use crate::providers::base::{CompletionOptions, Provider};
use crate::providers::errors::ProviderResult;
use crate::providers::utils::INVALID_TOOL_NAME;
use crate::toolset::Toolset;

/// Round trips allowed when no limit is configured
pub const DEFAULT_MAX_STEPS: usize = 2;

/// Where the loop stands between provider round trips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentState {
    AwaitingModel,
    EvaluatingToolRequests,
    ExecutingTools,
    Done,
    StepLimitReached,
}

/// How a run finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentOutcome {
    /// The model answered without asking for a tool
    Done,
    /// The loop was cut off after the configured number of round trips
    StepLimitReached,
}

/// One provider round trip and the tool executions it triggered
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    /// 1-based position in the run
    pub index: usize,
    pub response: Message,
    pub tool_requests: Vec<ToolRequest>,
    pub tool_responses: Vec<ToolResponse>,
    /// State the loop moved to once this step finished
    pub state: AgentState,
}

impl AgentStep {
    /// Messages this step appended to the history: the model reply, then one
    /// tool message per request in request order
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = vec![self.response.clone()];
        messages.extend(self.tool_responses.iter().map(|response| {
            Message::tool().with_tool_response(
                response.id.clone(),
                response.name.clone(),
                response.tool_result.clone(),
            )
        }));
        messages
    }
}

/// The result of driving the loop to completion
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRun {
    /// Text of the last model reply, possibly empty
    pub text: String,
    pub steps: Vec<AgentStep>,
    pub outcome: AgentOutcome,
    /// The input history followed by everything the run appended
    pub messages: Vec<Message>,
}

/// Agent pairs a provider with the tools it may call, and bounds how long it may keep calling them
pub struct Agent {
    provider: Arc<dyn Provider>,
    toolset: Toolset,
    system_prompt: String,
    max_steps: usize,
}

impl Agent {
    /// Create a new Agent with the specified provider
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            toolset: Toolset::new(),
            system_prompt: String::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_tools(mut self, toolset: Toolset) -> Self {
        self.toolset = toolset;
        self
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, system_prompt: S) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Limit the number of provider round trips, zero is treated as one
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Execute the requests of one model reply, in the order they were emitted.
    /// Failures become error results rather than ending the loop.
    async fn execute_tool_requests(&self, requests: &[ToolRequest]) -> Vec<ToolResponse> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            let (name, tool_result) = match &request.tool_call {
                Ok(call) => (call.name.clone(), self.toolset.dispatch(call).await),
                Err(e) => (INVALID_TOOL_NAME.to_string(), Err(e.clone())),
            };
            if let Err(e) = &tool_result {
                tracing::warn!(tool = %name, id = %request.id, error = %e, "tool call failed");
            }
            responses.push(ToolResponse {
                id: request.id.clone(),
                name,
                tool_result,
            });
        }
        responses
    }

    /// Create a stream that yields each step as it completes. The stream ends after
    /// a reply with no tool requests or once the step limit is reached; a provider
    /// failure ends it with an error.
    pub fn reply(&self, messages: &[Message]) -> BoxStream<'_, ProviderResult<AgentStep>> {
        let mut history = messages.to_vec();
        let tools = self.toolset.tools();

        Box::pin(async_stream::try_stream! {
            let mut index = 0;
            loop {
                tracing::debug!(state = ?AgentState::AwaitingModel, step = index + 1);
                let (response, usage) = self.provider.complete(
                    &self.system_prompt,
                    &history,
                    &tools,
                    &CompletionOptions::default(),
                ).await?;
                index += 1;
                tracing::debug!(
                    state = ?AgentState::EvaluatingToolRequests,
                    step = index,
                    input_tokens = ?usage.input_tokens,
                    output_tokens = ?usage.output_tokens,
                );

                let tool_requests: Vec<ToolRequest> =
                    response.tool_requests().into_iter().cloned().collect();

                let (tool_responses, state) = if tool_requests.is_empty() {
                    (Vec::new(), AgentState::Done)
                } else {
                    tracing::debug!(state = ?AgentState::ExecutingTools, step = index, count = tool_requests.len());
                    let tool_responses = self.execute_tool_requests(&tool_requests).await;
                    let state = if index >= self.max_steps {
                        AgentState::StepLimitReached
                    } else {
                        AgentState::AwaitingModel
                    };
                    (tool_responses, state)
                };

                let step = AgentStep {
                    index,
                    response,
                    tool_requests,
                    tool_responses,
                    state,
                };
                history.extend(step.messages());
                yield step;

                if state != AgentState::AwaitingModel {
                    tracing::debug!(state = ?state, steps = index, "agent loop finished");
                    break;
                }
            }
        })
    }

    /// Drive the loop to completion and return the full step log
    pub async fn run(&self, messages: &[Message]) -> ProviderResult<AgentRun> {
        let steps: Vec<AgentStep> = self.reply(messages).try_collect().await?;

        let mut history = messages.to_vec();
        for step in &steps {
            history.extend(step.messages());
        }

        let outcome = match steps.last().map(|step| step.state) {
            Some(AgentState::StepLimitReached) => AgentOutcome::StepLimitReached,
            _ => AgentOutcome::Done,
        };
        let text = steps
            .last()
            .map(|step| step.response.text())
            .unwrap_or_default();

        Ok(AgentRun {
            text,
            steps,
            outcome,
            messages: history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use crate::models::role::Role;
    use crate::models::tool::{Tool, ToolCall};
    use crate::providers::errors::ProviderError;
    use crate::providers::mock::{MockFailure, MockProvider};
    use crate::toolset::builtin::WeatherTool;
    use crate::toolset::FnTool;
    use anyhow::Result;
    use futures::StreamExt;
    use serde_json::{json, Value};

    fn echo_tool() -> FnTool<impl Fn(Value) -> futures::future::Ready<crate::errors::AgentResult<String>> + Send + Sync>
    {
        FnTool::new(
            Tool::new(
                "echo",
                "Echoes back the input",
                json!({"type": "object", "properties": {"message": {"type": "string"}}, "required": ["message"]}),
            ),
            |args: Value| {
                futures::future::ready(Ok(args["message"].as_str().unwrap_or("").to_string()))
            },
        )
    }

    fn agent_with(provider: &MockProvider) -> Agent {
        Agent::new(Arc::new(provider.clone()))
            .with_tools(Toolset::new().with(echo_tool()).unwrap())
    }

    #[tokio::test]
    async fn test_simple_response() -> Result<()> {
        let response = Message::assistant().with_text("Hello!");
        let provider = MockProvider::new(vec![response.clone()]);
        let agent = agent_with(&provider);

        let run = agent.run(&[Message::user().with_text("Hi")]).await?;

        assert_eq!(run.text, "Hello!");
        assert_eq!(run.outcome, AgentOutcome::Done);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].response, response);
        assert!(run.steps[0].tool_responses.is_empty());
        assert_eq!(provider.calls().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_call() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("echo", json!({"message": "test"})))),
            Message::assistant().with_text("Done!"),
        ]);
        let agent = agent_with(&provider);

        let run = agent.run(&[Message::user().with_text("Echo test")]).await?;

        assert_eq!(run.outcome, AgentOutcome::Done);
        assert_eq!(run.text, "Done!");
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.steps[0].tool_responses[0].tool_result, Ok("test".to_string()));

        // user, assistant request, tool result, assistant text
        let roles: Vec<Role> = run.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );

        // the second round trip carries the tool result back to the model
        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tools.len(), 1);
        assert_eq!(calls[1].messages.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_step_limit_is_a_hard_cutoff() -> Result<()> {
        let request = |id: &str| {
            Message::assistant()
                .with_text(format!("calling {}", id))
                .with_tool_request(id, Ok(ToolCall::new("echo", json!({"message": id}))))
        };
        let provider = MockProvider::new(vec![request("1"), request("2"), request("3")]);
        let agent = agent_with(&provider).with_max_steps(2);

        let run = agent.run(&[Message::user().with_text("loop forever")]).await?;

        assert_eq!(provider.calls().len(), 2);
        assert_eq!(run.outcome, AgentOutcome::StepLimitReached);
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.text, "calling 2");
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_steps_behaves_like_one() -> Result<()> {
        let provider = MockProvider::new(vec![Message::assistant()
            .with_tool_request("1", Ok(ToolCall::new("echo", json!({"message": "x"}))))]);
        let agent = agent_with(&provider).with_max_steps(0);
        assert_eq!(agent.max_steps(), 1);

        let run = agent.run(&[Message::user().with_text("hi")]).await?;
        assert_eq!(provider.calls().len(), 1);
        assert_eq!(run.outcome, AgentOutcome::StepLimitReached);
        assert_eq!(run.text, "");
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_tools_are_answered_in_order() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("echo", json!({"message": "first"}))))
                .with_tool_request("2", Ok(ToolCall::new("missing", json!({}))))
                .with_tool_request("3", Ok(ToolCall::new("echo", json!({"message": 7}))))
                .with_tool_request(
                    "4",
                    Err(AgentError::InvalidParameters("not json".to_string())),
                ),
            Message::assistant().with_text("All done!"),
        ]);
        let agent = agent_with(&provider);

        let run = agent.run(&[Message::user().with_text("Multiple calls")]).await?;

        let responses = &run.steps[0].tool_responses;
        let ids: Vec<&str> = responses.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(responses[0].tool_result, Ok("first".to_string()));
        assert_eq!(
            responses[1].tool_result,
            Err(AgentError::ToolNotFound("missing".to_string()))
        );
        assert!(matches!(
            responses[2].tool_result,
            Err(AgentError::InvalidParameters(_))
        ));
        assert_eq!(responses[3].name, INVALID_TOOL_NAME);

        // one tool message per request, between the two assistant turns
        let tool_messages = run
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .count();
        assert_eq!(tool_messages, 4);
        assert_eq!(run.text, "All done!");
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_failure_aborts() {
        let provider = MockProvider::failing(MockFailure::Call("boom".to_string()));
        let agent = agent_with(&provider);

        let result = agent.run(&[Message::user().with_text("hi")]).await;
        assert!(matches!(result, Err(ProviderError::Response(_))));
    }

    #[tokio::test]
    async fn test_reply_streams_steps() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("echo", json!({"message": "a"})))),
            Message::assistant().with_text("b"),
        ]);
        let agent = agent_with(&provider);
        let messages = [Message::user().with_text("hi")];

        let mut stream = agent.reply(&messages);
        let first = stream.next().await.unwrap()?;
        assert_eq!(first.index, 1);
        assert_eq!(first.state, AgentState::AwaitingModel);
        // the second round trip only happens once the stream is polled again
        assert_eq!(provider.calls().len(), 1);

        let second = stream.next().await.unwrap()?;
        assert_eq!(second.state, AgentState::Done);
        assert!(stream.next().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_weather_in_karachi() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "call_1",
                Ok(ToolCall::new("getWeather", json!({"city": "Karachi"}))),
            ),
            Message::assistant().with_text(
                "It is sunny in Karachi with a temperature of 25°C.",
            ),
        ]);
        let agent = Agent::new(Arc::new(provider.clone()))
            .with_system_prompt("You are an AI code reviewer.")
            .with_tools(Toolset::new().with(WeatherTool::new()).unwrap())
            .with_max_steps(2);

        let run = agent
            .run(&[Message::user().with_text("What's the weather in Karachi?")])
            .await?;

        let executions: Vec<&ToolResponse> = run
            .steps
            .iter()
            .flat_map(|step| step.tool_responses.iter())
            .collect();
        assert_eq!(executions.len(), 1);
        assert_eq!(
            executions[0].tool_result,
            Ok("The current weather in Karachi is sunny with a temperature of 25°C.".to_string())
        );
        assert_eq!(run.steps[0].tool_requests[0].tool_call.as_ref().unwrap().arguments["city"], "Karachi");
        assert!(run.text.contains("25°C"));
        assert_eq!(provider.calls()[0].system, "You are an AI code reviewer.");
        Ok(())
    }
}
