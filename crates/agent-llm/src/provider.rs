use agent_core::{ProjectSnapshot, StructuredResponse};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("{provider}: configuration error: {message}")]
    Config { provider: String, message: String },

    #[error("{provider}: HTTP error: {source}")]
    Http {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: API error (HTTP {status}): {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider}: invalid response envelope: {message}")]
    Envelope { provider: String, message: String },

    #[error("{provider}: response does not match the JSON contract: {source}")]
    Contract {
        provider: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LLMError {
    pub fn config(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Id of the provider that produced the error.
    pub fn provider_id(&self) -> &str {
        match self {
            Self::Config { provider, .. }
            | Self::Http { provider, .. }
            | Self::Api { provider, .. }
            | Self::Envelope { provider, .. }
            | Self::Contract { provider, .. } => provider,
        }
    }

    /// True when the backend answered but the payload was not a `StructuredResponse`.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Contract { .. })
    }

    /// True for connectivity and HTTP status failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Api { .. } | Self::Envelope { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LLMError>;

/// Parses the payload a backend embedded in its transport envelope.
pub fn parse_contract(provider: &str, payload: &str) -> Result<StructuredResponse> {
    serde_json::from_str(payload).map_err(|source| LLMError::Contract {
        provider: provider.to_string(),
        source,
    })
}

/// A backend able to answer a prompt with a [`StructuredResponse`].
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Stable identifier, used as the key in the settings document.
    fn id(&self) -> &str;

    /// Human readable name.
    fn name(&self) -> &str;

    /// Apply this provider's entry of the settings document.
    ///
    /// The value is opaque to callers; each provider deserializes the shape it
    /// understands. Providers without mutable configuration keep the default.
    async fn update_settings(&self, _settings: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    /// Generate a structured response for `prompt` given the project `context`.
    async fn generate_response(
        &self,
        prompt: &str,
        context: &ProjectSnapshot,
    ) -> Result<StructuredResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_contract_success() {
        let response = parse_contract(
            "ollama",
            r#"{"summary":"ok","changes":[{"path":"a","action":"create","content":"x"}]}"#,
        )
        .unwrap();
        assert_eq!(response.summary, "ok");
        assert_eq!(response.changes.len(), 1);
    }

    #[test]
    fn test_parse_contract_failure_is_contract_violation() {
        let err = parse_contract("openai", "Sure! Here is the code:").unwrap_err();
        assert!(err.is_contract_violation());
        assert!(!err.is_transport());
        assert_eq!(err.provider_id(), "openai");
        assert!(err.to_string().starts_with("openai:"));
    }

    #[test]
    fn test_config_error_names_provider() {
        let err = LLMError::config("openai", "API key is missing");
        assert_eq!(err.provider_id(), "openai");
        assert_eq!(err.to_string(), "openai: configuration error: API key is missing");
    }
}
