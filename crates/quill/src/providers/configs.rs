use super::errors::{ProviderError, ProviderResult};

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Gemini(GeminiProviderConfig),
    OpenAi(OpenAiProviderConfig),
}

#[derive(Debug, Clone)]
pub struct GeminiProviderConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl GeminiProviderConfig {
    pub fn api_key(&self) -> ProviderResult<&str> {
        require_key(&self.api_key, "No Google API key found, set GEMINI_API_KEY")
    }
}

/// Also used for OpenAI compatible servers (LM Studio, vLLM, ...) by pointing `host` at them
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl OpenAiProviderConfig {
    pub fn api_key(&self) -> ProviderResult<&str> {
        require_key(&self.api_key, "No OpenAI API key found, set OPENAI_API_KEY")
    }
}

fn require_key<'a>(key: &'a Option<String>, message: &str) -> ProviderResult<&'a str> {
    match key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(ProviderError::Auth(message.to_string())),
    }
}
