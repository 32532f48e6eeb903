//! Local-inference backend talking to an Ollama server.

use agent_core::{ProjectSnapshot, StructuredResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::prompt::build_full_prompt;
use crate::provider::{parse_contract, AIProvider, LLMError, Result};

pub const OLLAMA_ID: &str = "ollama";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_OLLAMA_MODEL: &str = "codellama";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateEnvelope {
    response: String,
}

#[derive(Debug, Default, Deserialize)]
struct OllamaSettings {
    #[serde(default)]
    model: Option<String>,
}

pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: RwLock<String>,
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            model: RwLock::new(DEFAULT_OLLAMA_MODEL.to_string()),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = RwLock::new(model.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn model(&self) -> String {
        self.model.read().await.clone()
    }
}

#[async_trait]
impl AIProvider for OllamaProvider {
    fn id(&self) -> &str {
        OLLAMA_ID
    }

    fn name(&self) -> &str {
        "Ollama"
    }

    async fn update_settings(&self, settings: &serde_json::Value) -> Result<()> {
        let settings: OllamaSettings = serde_json::from_value(settings.clone())
            .map_err(|e| LLMError::config(OLLAMA_ID, format!("invalid settings: {}", e)))?;

        if let Some(model) = settings.model.filter(|m| !m.is_empty()) {
            log::debug!("Ollama provider now using model '{}'", model);
            *self.model.write().await = model;
        }
        Ok(())
    }

    async fn generate_response(
        &self,
        prompt: &str,
        context: &ProjectSnapshot,
    ) -> Result<StructuredResponse> {
        let model = self.model().await;
        let body = GenerateRequest {
            model: &model,
            prompt: build_full_prompt(prompt, context),
            stream: false,
            format: "json",
        };

        log::debug!("Ollama request to {} with model '{}'", self.endpoint, model);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|source| LLMError::Http {
                provider: OLLAMA_ID.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LLMError::Api {
                provider: OLLAMA_ID.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let text = response.text().await.map_err(|source| LLMError::Http {
            provider: OLLAMA_ID.to_string(),
            source,
        })?;

        let envelope: GenerateEnvelope =
            serde_json::from_str(&text).map_err(|e| LLMError::Envelope {
                provider: OLLAMA_ID.to_string(),
                message: e.to_string(),
            })?;

        parse_contract(OLLAMA_ID, &envelope.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_provider_defaults() {
        let provider = OllamaProvider::new();
        assert_eq!(provider.endpoint(), DEFAULT_OLLAMA_ENDPOINT);
        assert_eq!(provider.id(), "ollama");
        assert_eq!(provider.name(), "Ollama");
    }

    #[tokio::test]
    async fn test_update_settings_changes_model() {
        let provider = OllamaProvider::new();
        provider
            .update_settings(&json!({"model": "llama3"}))
            .await
            .unwrap();
        assert_eq!(provider.model().await, "llama3");
    }

    #[tokio::test]
    async fn test_update_settings_ignores_empty_model() {
        let provider = OllamaProvider::new().with_model("qwen");
        provider.update_settings(&json!({"model": ""})).await.unwrap();
        provider.update_settings(&json!({})).await.unwrap();
        assert_eq!(provider.model().await, "qwen");
    }

    #[tokio::test]
    async fn test_update_settings_rejects_wrong_shape() {
        let provider = OllamaProvider::new();
        let err = provider
            .update_settings(&json!({"model": 42}))
            .await
            .unwrap_err();
        assert_eq!(err.provider_id(), OLLAMA_ID);
        assert_eq!(provider.model().await, DEFAULT_OLLAMA_MODEL);
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            model: "codellama",
            prompt: "p".to_string(),
            stream: false,
            format: "json",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({"model": "codellama", "prompt": "p", "stream": false, "format": "json"})
        );
    }
}
