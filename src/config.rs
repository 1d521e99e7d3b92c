//! Client configuration.
//!
//! The client never reads the environment itself — the caller builds a
//! [`ClientConfig`] explicitly, or uses [`ClientConfig::from_env`] as the
//! boundary that resolves `OPENAI_API_KEY` / `OPENAI_API_BASE` once.

use crate::errors::ChatError;

/// Base URL used when `OPENAI_API_BASE` is not set.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the API key.
const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Environment variable holding the API base URL.
const API_BASE_VAR: &str = "OPENAI_API_BASE";

/// Configuration for a [`ChatClient`](crate::client::ChatClient).
///
/// Holds everything one client instance needs: credentials, endpoint, model
/// identifier, the optional system prompt and seed context that open the
/// conversation, and sampling knobs (omitted from the request when `None`,
/// leaving the provider defaults in effect).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Inserted as the first (system) message of the conversation.
    pub system_prompt: Option<String>,
    /// Seed context, appended as a user message before any exchange.
    pub context: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ClientConfig {
    /// Build a config with explicit credentials and endpoint.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            system_prompt: None,
            context: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Build a config from the process environment.
    ///
    /// Reads `OPENAI_API_KEY` (required) and `OPENAI_API_BASE` (falls back to
    /// [`DEFAULT_BASE_URL`]). This is the only place the crate touches the
    /// environment.
    pub fn from_env(model: impl Into<String>) -> Result<Self, ChatError> {
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| ChatError::Config {
            reason: format!("{API_KEY_VAR} is not set"),
        })?;
        let base_url =
            std::env::var(API_BASE_VAR).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(api_key, base_url, model))
    }

    /// Set the system prompt that opens the conversation.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the seed context, sent as the first user message.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_leaves_optionals_unset() {
        let config = ClientConfig::new("sk-test", "http://localhost:8080/v1", "test-model");
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.model, "test-model");
        assert!(config.system_prompt.is_none());
        assert!(config.context.is_none());
        assert!(config.temperature.is_none());
        assert!(config.max_tokens.is_none());
    }

    #[test]
    fn test_builder_setters() {
        let config = ClientConfig::new("sk-test", DEFAULT_BASE_URL, "test-model")
            .with_system_prompt("You are terse.")
            .with_context("The user is debugging a parser.")
            .with_temperature(0.2)
            .with_max_tokens(512);
        assert_eq!(config.system_prompt.as_deref(), Some("You are terse."));
        assert_eq!(config.context.as_deref(), Some("The user is debugging a parser."));
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.max_tokens, Some(512));
    }

    #[test]
    fn test_from_env_requires_api_key() {
        // Serialize env mutation against the other from_env test.
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var(API_KEY_VAR);
        let result = ClientConfig::from_env("test-model");
        assert!(matches!(result, Err(ChatError::Config { .. })));
    }

    #[test]
    fn test_from_env_defaults_base_url() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(API_KEY_VAR, "sk-env-test");
        std::env::remove_var(API_BASE_VAR);

        let config = ClientConfig::from_env("test-model").unwrap();
        assert_eq!(config.api_key, "sk-env-test");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);

        std::env::set_var(API_BASE_VAR, "http://localhost:11434/v1");
        let config = ClientConfig::from_env("test-model").unwrap();
        assert_eq!(config.base_url, "http://localhost:11434/v1");

        std::env::remove_var(API_KEY_VAR);
        std::env::remove_var(API_BASE_VAR);
    }

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
}
