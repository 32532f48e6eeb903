pub mod prompt;
pub mod provider;
pub mod provider_factory;
pub mod providers;
pub mod registry;

pub use provider::{parse_contract, AIProvider, LLMError, Result};
pub use provider_factory::{create_provider, default_registry, AVAILABLE_PROVIDERS};
pub use providers::{MockAIProvider, OllamaProvider, OpenAIProvider};
pub use registry::{ProviderRegistry, SharedProvider};
