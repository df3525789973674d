//! Client selection.
//!
//! The coordinator never decides between the real service and the
//! substitute: whoever builds it passes an `Arc<dyn ContentGenerationClient>`
//! produced here from configuration.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::{ContentGenerationClient, FallbackClient, HttpClient, SubstituteClient};

/// AI service settings, the `[ai]` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Chat completions URL
    pub endpoint: String,

    /// Model name sent with each request
    pub model: String,

    /// Credential; takes precedence over `api_key_env`
    pub api_key: Option<String>,

    /// Environment variable read when `api_key` is unset
    pub api_key_env: String,

    /// Always use the substitute, even with a credential
    pub use_substitute: bool,

    /// Answer quota-exhausted failures from the substitute
    pub fallback_on_quota: bool,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Completion length limit
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Artificial substitute delay in milliseconds
    pub substitute_latency_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            api_key_env: "INKLING_API_KEY".to_string(),
            use_substitute: false,
            fallback_on_quota: true,
            timeout_ms: 30_000,
            max_tokens: 60,
            temperature: 0.7,
            substitute_latency_ms: 0,
        }
    }
}

impl AiConfig {
    /// Resolves the credential from the config or the environment.
    ///
    /// Blank values count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }

    fn substitute(&self) -> SubstituteClient {
        SubstituteClient::new().with_latency(Duration::from_millis(self.substitute_latency_ms))
    }
}

/// Builds the client described by `config`.
///
/// Without a credential, or with `use_substitute` set, this is the
/// substitute. A client that can't be constructed also routes to the
/// substitute so the editor keeps working.
pub fn client_from_config(config: &AiConfig) -> Arc<dyn ContentGenerationClient> {
    if config.use_substitute {
        tracing::info!("Using substitute generation (requested by config)");
        return Arc::new(config.substitute());
    }

    let Some(api_key) = config.resolve_api_key() else {
        tracing::info!(
            env = %config.api_key_env,
            "No AI credential configured, using substitute generation"
        );
        return Arc::new(config.substitute());
    };

    let http = match HttpClient::new(
        config.endpoint.clone(),
        api_key,
        config.model.clone(),
        Duration::from_millis(config.timeout_ms),
    ) {
        Ok(client) => client
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature),
        Err(e) => {
            tracing::warn!("Failed to build AI client, using substitute: {}", e);
            return Arc::new(config.substitute());
        }
    };

    tracing::info!(model = %config.model, endpoint = %config.endpoint, "Using AI service");

    if config.fallback_on_quota {
        Arc::new(FallbackClient::new(Arc::new(http), Arc::new(config.substitute())))
    } else {
        Arc::new(http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: AiConfig = toml::from_str("model = \"local\"").unwrap();
        assert_eq!(config.model, "local");
        assert_eq!(config.api_key_env, "INKLING_API_KEY");
        assert!(config.fallback_on_quota);
    }

    #[test]
    fn test_no_credential_selects_substitute() {
        let config = AiConfig {
            api_key: None,
            api_key_env: "INKLING_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..AiConfig::default()
        };
        assert_eq!(client_from_config(&config).name(), "substitute");
    }

    #[test]
    fn test_blank_credential_counts_as_absent() {
        let config = AiConfig {
            api_key: Some("   ".to_string()),
            api_key_env: "INKLING_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..AiConfig::default()
        };
        assert!(config.resolve_api_key().is_none());
    }

    #[test]
    fn test_explicit_flag_wins_over_credential() {
        let config = AiConfig {
            api_key: Some("sk-test".to_string()),
            use_substitute: true,
            ..AiConfig::default()
        };
        assert_eq!(client_from_config(&config).name(), "substitute");
    }

    #[test]
    fn test_credential_selects_service() {
        let with_fallback = AiConfig {
            api_key: Some("sk-test".to_string()),
            ..AiConfig::default()
        };
        assert_eq!(client_from_config(&with_fallback).name(), "fallback");

        let plain = AiConfig {
            fallback_on_quota: false,
            ..with_fallback
        };
        assert_eq!(client_from_config(&plain).name(), "http");
    }
}
