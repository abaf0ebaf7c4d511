use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use quill::agent::DEFAULT_MAX_STEPS;
use quill::gateway::{AttachmentLimits, DEFAULT_MAX_AUDIO_BYTES, DEFAULT_MAX_DOCUMENT_BYTES};
use quill::providers::{
    configs::{GeminiProviderConfig, OpenAiProviderConfig, ProviderConfig},
    factory::ProviderType,
    gemini, openai,
};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Gemini {
        #[serde(default = "default_gemini_host")]
        host: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_gemini_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderSettings::Gemini { .. } => ProviderType::Gemini,
            ProviderSettings::OpenAi { .. } => ProviderType::OpenAi,
        }
    }

    // Convert to the quill ProviderConfig. A key left unset falls back to the
    // provider's conventional variable; still missing is reported per call.
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::Gemini {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Gemini(GeminiProviderConfig {
                host,
                api_key: api_key.or_else(|| std::env::var("GEMINI_API_KEY").ok()),
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key: api_key.or_else(|| std::env::var("OPENAI_API_KEY").ok()),
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitSettings {
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_document_bytes: default_max_document_bytes(),
            max_audio_bytes: default_max_audio_bytes(),
        }
    }
}

impl LimitSettings {
    pub fn attachment_limits(&self) -> AttachmentLimits {
        AttachmentLimits {
            max_document_bytes: self.max_document_bytes,
            max_audio_bytes: self.max_audio_bytes,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub limits: LimitSettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Provider defaults, the per provider fields default in serde
            .set_default("provider.type", ProviderType::Gemini.to_string())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("QUILL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Try to deserialize the configuration
        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        // Handle missing field errors specially
        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // Handle both NotFound and missing field message variants
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // Extract field name from error message "missing field `type`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_gemini_host() -> String {
    gemini::GEMINI_HOST.to_string()
}

fn default_gemini_model() -> String {
    gemini::GEMINI_MODEL.to_string()
}

fn default_openai_host() -> String {
    openai::OPENAI_HOST.to_string()
}

fn default_openai_model() -> String {
    openai::OPENAI_MODEL.to_string()
}

fn default_max_document_bytes() -> usize {
    DEFAULT_MAX_DOCUMENT_BYTES
}

fn default_max_audio_bytes() -> usize {
    DEFAULT_MAX_AUDIO_BYTES
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("QUILL_") || key == "GEMINI_API_KEY" || key == "OPENAI_API_KEY" {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.limits.max_document_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.limits.max_audio_bytes, 25 * 1024 * 1024);
        assert_eq!(settings.agent.max_steps, 2);
        assert_eq!(settings.provider.provider_type(), ProviderType::Gemini);

        if let ProviderSettings::Gemini {
            host,
            api_key,
            model,
            temperature,
            max_tokens,
        } = settings.provider
        {
            assert_eq!(host, "https://generativelanguage.googleapis.com");
            assert_eq!(api_key, None);
            assert_eq!(model, "gemini-2.0-flash-exp");
            assert_eq!(temperature, None);
            assert_eq!(max_tokens, None);
        } else {
            panic!("Expected Gemini provider");
        }
    }

    #[test]
    #[serial]
    fn test_conventional_key_fallback() {
        clean_env();
        env::set_var("GEMINI_API_KEY", "from-conventional-var");

        let settings = Settings::new().unwrap();
        match settings.provider.into_config() {
            ProviderConfig::Gemini(config) => {
                assert_eq!(config.api_key.as_deref(), Some("from-conventional-var"))
            }
            other => panic!("Expected Gemini config, got {:?}", other),
        }

        // the prefixed variable wins
        env::set_var("QUILL_PROVIDER__API_KEY", "from-quill-var");
        let settings = Settings::new().unwrap();
        match settings.provider.into_config() {
            ProviderConfig::Gemini(config) => {
                assert_eq!(config.api_key.as_deref(), Some("from-quill-var"))
            }
            other => panic!("Expected Gemini config, got {:?}", other),
        }

        // Clean up
        env::remove_var("GEMINI_API_KEY");
        env::remove_var("QUILL_PROVIDER__API_KEY");
    }

    #[test]
    #[serial]
    fn test_openai_settings() {
        clean_env();
        env::set_var("QUILL_PROVIDER__TYPE", "openai");
        env::set_var("QUILL_PROVIDER__API_KEY", "test-key");
        env::set_var("QUILL_PROVIDER__HOST", "http://localhost:1234");
        env::set_var("QUILL_PROVIDER__MODEL", "llama-3.2-1b");
        env::set_var("QUILL_PROVIDER__TEMPERATURE", "0.7");
        env::set_var("QUILL_PROVIDER__MAX_TOKENS", "2000");

        let settings = Settings::new().unwrap();
        if let ProviderSettings::OpenAi {
            host,
            api_key,
            model,
            temperature,
            max_tokens,
        } = settings.provider
        {
            assert_eq!(host, "http://localhost:1234");
            assert_eq!(api_key.as_deref(), Some("test-key"));
            assert_eq!(model, "llama-3.2-1b");
            assert_eq!(temperature, Some(0.7));
            assert_eq!(max_tokens, Some(2000));
        } else {
            panic!("Expected OpenAI provider");
        }

        // Clean up
        env::remove_var("QUILL_PROVIDER__TYPE");
        env::remove_var("QUILL_PROVIDER__API_KEY");
        env::remove_var("QUILL_PROVIDER__HOST");
        env::remove_var("QUILL_PROVIDER__MODEL");
        env::remove_var("QUILL_PROVIDER__TEMPERATURE");
        env::remove_var("QUILL_PROVIDER__MAX_TOKENS");
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("QUILL_SERVER__PORT", "8080");
        env::set_var("QUILL_LIMITS__MAX_DOCUMENT_BYTES", "1024");
        env::set_var("QUILL_AGENT__MAX_STEPS", "5");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.agent.max_steps, 5);

        let limits = settings.limits.attachment_limits();
        assert_eq!(limits.max_document_bytes, 1024);
        assert_eq!(limits.max_audio_bytes, 25 * 1024 * 1024);
        assert!(limits.document_mime_types.contains(&"application/pdf".to_string()));

        // Clean up
        env::remove_var("QUILL_SERVER__PORT");
        env::remove_var("QUILL_LIMITS__MAX_DOCUMENT_BYTES");
        env::remove_var("QUILL_AGENT__MAX_STEPS");
    }

    #[test]
    #[serial]
    fn test_unknown_provider_type() {
        clean_env();
        env::set_var("QUILL_PROVIDER__TYPE", "ollama");

        let result = Settings::new();
        assert!(matches!(result, Err(ConfigError::Other(_))));

        env::remove_var("QUILL_PROVIDER__TYPE");
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");

        let bad = ServerSettings {
            host: "not a host".to_string(),
            port: 3000,
        };
        assert!(bad.socket_addr().is_err());
    }
}
