use super::{
    base::Provider, configs::ProviderConfig, errors::ProviderResult, gemini::GeminiProvider,
    openai::OpenAiProvider,
};
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    Gemini,
    OpenAi,
}

impl ProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderConfig::Gemini(_) => ProviderType::Gemini,
            ProviderConfig::OpenAi(_) => ProviderType::OpenAi,
        }
    }
}

pub fn get_provider(config: ProviderConfig) -> ProviderResult<Arc<dyn Provider>> {
    match config {
        ProviderConfig::Gemini(gemini_config) => Ok(Arc::new(GeminiProvider::new(gemini_config)?)),
        ProviderConfig::OpenAi(openai_config) => Ok(Arc::new(OpenAiProvider::new(openai_config)?)),
    }
}
