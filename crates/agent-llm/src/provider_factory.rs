//! Provider Factory
//!
//! Creates the built-in providers and the default registry.

use crate::provider::LLMError;
use crate::providers::mock::MOCK_ID;
use crate::providers::ollama::OLLAMA_ID;
use crate::providers::openai::OPENAI_ID;
use crate::providers::{MockAIProvider, OllamaProvider, OpenAIProvider};
use crate::registry::{ProviderRegistry, SharedProvider};
use std::sync::Arc;

/// Built-in provider ids, in registration order.
pub const AVAILABLE_PROVIDERS: &[&str] = &[OLLAMA_ID, OPENAI_ID, MOCK_ID];

/// Create a built-in provider by id, with default configuration.
pub fn create_provider(id: &str) -> Result<SharedProvider, LLMError> {
    match id {
        OLLAMA_ID => Ok(Arc::new(OllamaProvider::new())),
        OPENAI_ID => Ok(Arc::new(OpenAIProvider::new())),
        MOCK_ID => Ok(Arc::new(MockAIProvider::new())),
        _ => Err(LLMError::config(
            id,
            format!(
                "Unknown provider. Available providers: {}",
                AVAILABLE_PROVIDERS.join(", ")
            ),
        )),
    }
}

/// Registry holding every built-in provider; the local-inference backend is active.
pub fn default_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for id in AVAILABLE_PROVIDERS {
        match create_provider(id) {
            Ok(provider) => registry.register_shared(provider),
            Err(e) => log::error!("Failed to create built-in provider '{}': {}", id, e),
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_contains_all_builtins() {
        let registry = default_registry();
        assert_eq!(registry.provider_ids(), AVAILABLE_PROVIDERS);
        assert_eq!(registry.active_provider_id(), Some(OLLAMA_ID));
    }

    #[test]
    fn test_create_unknown_provider() {
        let result = create_provider("unknown");
        match result {
            Err(LLMError::Config { provider, message }) => {
                assert_eq!(provider, "unknown");
                assert!(message.contains("Unknown provider"));
            }
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_create_each_builtin() {
        for id in AVAILABLE_PROVIDERS {
            let provider = create_provider(id).unwrap();
            assert_eq!(provider.id(), *id);
        }
    }
}
