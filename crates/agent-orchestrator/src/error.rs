use agent_config::SettingsError;
use agent_llm::LLMError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("No active AI provider configured")]
    NoActiveProvider,

    #[error("A prompt is already being processed")]
    PromptInFlight,

    #[error(transparent)]
    Provider(#[from] LLMError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
