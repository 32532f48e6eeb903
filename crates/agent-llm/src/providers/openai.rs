//! Hosted-API backend using the OpenAI chat completions endpoint in JSON mode.

use agent_core::{ProjectSnapshot, Role, StructuredResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::prompt::{build_user_content, SYSTEM_INSTRUCTION};
use crate::provider::{parse_contract, AIProvider, LLMError, Result};

pub const OPENAI_ID: &str = "openai";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Serialize, PartialEq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionEnvelope {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenAISettings {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Clone)]
struct OpenAIConfig {
    model: String,
    api_key: String,
}

pub struct OpenAIProvider {
    client: Client,
    endpoint: String,
    api_key_env: Option<String>,
    config: RwLock<OpenAIConfig>,
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAIProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            api_key_env: Some(OPENAI_API_KEY_ENV.to_string()),
            config: RwLock::new(OpenAIConfig {
                model: DEFAULT_OPENAI_MODEL.to_string(),
                api_key: String::new(),
            }),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.get_mut().model = model.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.get_mut().api_key = api_key.into();
        self
    }

    /// Do not consult `OPENAI_API_KEY` when no key is configured.
    pub fn without_env_fallback(mut self) -> Self {
        self.api_key_env = None;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn model(&self) -> String {
        self.config.read().await.model.clone()
    }

    fn resolve_api_key(&self, configured: &str) -> Result<String> {
        if !configured.is_empty() {
            return Ok(configured.to_string());
        }
        if let Some(var) = &self.api_key_env {
            if let Ok(key) = std::env::var(var) {
                if !key.is_empty() {
                    return Ok(key);
                }
            }
        }
        Err(LLMError::config(
            OPENAI_ID,
            "API key is missing. Please check settings.",
        ))
    }
}

fn build_messages(prompt: &str, context: &ProjectSnapshot) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.recent_history.len() + 2);
    messages.push(ChatMessage {
        role: "system",
        content: SYSTEM_INSTRUCTION.to_string(),
    });
    messages.extend(context.recent_history.iter().map(|turn| ChatMessage {
        role: match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: turn.content.clone(),
    }));
    messages.push(ChatMessage {
        role: "user",
        content: build_user_content(prompt, context),
    });
    messages
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    fn id(&self) -> &str {
        OPENAI_ID
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn update_settings(&self, settings: &serde_json::Value) -> Result<()> {
        let settings: OpenAISettings = serde_json::from_value(settings.clone())
            .map_err(|e| LLMError::config(OPENAI_ID, format!("invalid settings: {}", e)))?;

        let mut config = self.config.write().await;
        if let Some(model) = settings.model.filter(|m| !m.is_empty()) {
            config.model = model;
        }
        if let Some(api_key) = settings.api_key {
            config.api_key = api_key;
        }
        log::debug!("OpenAI provider now using model '{}'", config.model);
        Ok(())
    }

    async fn generate_response(
        &self,
        prompt: &str,
        context: &ProjectSnapshot,
    ) -> Result<StructuredResponse> {
        let config = self.config.read().await.clone();
        let api_key = self.resolve_api_key(&config.api_key)?;

        let body = ChatCompletionRequest {
            model: &config.model,
            messages: build_messages(prompt, context),
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        log::debug!(
            "OpenAI request to {} with model '{}' ({} messages)",
            self.endpoint,
            config.model,
            body.messages.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|source| LLMError::Http {
                provider: OPENAI_ID.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LLMError::Api {
                provider: OPENAI_ID.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let text = response.text().await.map_err(|source| LLMError::Http {
            provider: OPENAI_ID.to_string(),
            source,
        })?;

        let envelope: ChatCompletionEnvelope =
            serde_json::from_str(&text).map_err(|e| LLMError::Envelope {
                provider: OPENAI_ID.to_string(),
                message: e.to_string(),
            })?;

        let content = envelope
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Envelope {
                provider: OPENAI_ID.to_string(),
                message: "response contained no choices".to_string(),
            })?
            .message
            .content
            .ok_or_else(|| LLMError::Envelope {
                provider: OPENAI_ID.to_string(),
                message: "first choice has no message content".to_string(),
            })?;

        parse_contract(OPENAI_ID, &content)
    }
}
