//! Provider registry.
//!
//! Holds every registered provider by id and tracks exactly one active
//! provider. The first registered provider becomes active.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::provider::{AIProvider, LLMError};

pub type SharedProvider = Arc<dyn AIProvider>;

#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, SharedProvider>,
    order: Vec<String>,
    active_provider_id: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&mut self, provider: P)
    where
        P: AIProvider + 'static,
    {
        self.register_shared(Arc::new(provider));
    }

    /// Register an already shared provider. An existing entry with the same id is replaced.
    pub fn register_shared(&mut self, provider: SharedProvider) {
        let id = provider.id().to_string();
        if self.providers.insert(id.clone(), provider).is_none() {
            self.order.push(id.clone());
        } else {
            log::debug!("Replaced provider '{}'", id);
        }

        if self.active_provider_id.is_none() {
            self.active_provider_id = Some(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<SharedProvider> {
        self.providers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    pub fn active_provider(&self) -> Option<SharedProvider> {
        self.active_provider_id
            .as_deref()
            .and_then(|id| self.get(id))
    }

    pub fn active_provider_id(&self) -> Option<&str> {
        self.active_provider_id.as_deref()
    }

    /// Select the active provider. Unknown ids leave the current selection untouched.
    pub fn set_active_provider(&mut self, id: &str) -> bool {
        if !self.providers.contains_key(id) {
            log::warn!("Ignoring unknown provider id '{}'", id);
            return false;
        }
        self.active_provider_id = Some(id.to_string());
        true
    }

    /// Registered ids in registration order.
    pub fn provider_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn for_each_provider<F>(&self, mut f: F)
    where
        F: FnMut(&SharedProvider),
    {
        for id in &self.order {
            if let Some(provider) = self.providers.get(id) {
                f(provider);
            }
        }
    }

    /// Push each entry of `settings_by_id` to the provider with that id.
    ///
    /// Entries without a registered provider are skipped. Providers that reject
    /// their entry keep their previous configuration; their errors are returned.
    pub async fn apply_all(
        &self,
        settings_by_id: &BTreeMap<String, serde_json::Value>,
    ) -> Vec<LLMError> {
        let mut errors = Vec::new();
        for (id, settings) in settings_by_id {
            let Some(provider) = self.get(id) else {
                log::debug!("No provider registered for settings entry '{}'", id);
                continue;
            };
            if let Err(e) = provider.update_settings(settings).await {
                log::warn!("Failed to apply settings to provider '{}': {}", id, e);
                errors.push(e);
            }
        }
        errors
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockAIProvider, OllamaProvider, OpenAIProvider};
    use serde_json::json;

    #[test]
    fn test_empty_registry_has_no_active_provider() {
        let registry = ProviderRegistry::new();
        assert!(registry.active_provider().is_none());
        assert!(registry.active_provider_id().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_first_registered_becomes_active() {
        let mut registry = ProviderRegistry::new();
        registry.register(OllamaProvider::new());
        registry.register(MockAIProvider::new());

        assert_eq!(registry.active_provider_id(), Some("ollama"));
        assert_eq!(registry.active_provider().unwrap().id(), "ollama");
        assert_eq!(registry.provider_ids(), vec!["ollama", "mock-ai"]);
    }

    #[test]
    fn test_set_active_provider_unknown_id_is_noop() {
        let mut registry = ProviderRegistry::new();
        registry.register(OllamaProvider::new());
        registry.register(MockAIProvider::new());
        assert!(registry.set_active_provider("mock-ai"));

        assert!(!registry.set_active_provider("nonexistent"));
        assert_eq!(registry.active_provider_id(), Some("mock-ai"));
    }

    #[test]
    fn test_reregistering_keeps_ids_unique() {
        let mut registry = ProviderRegistry::new();
        registry.register(MockAIProvider::new());
        registry.register(MockAIProvider::new());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.provider_ids(), vec!["mock-ai"]);
    }

    #[test]
    fn test_for_each_provider_visits_in_order() {
        let mut registry = ProviderRegistry::new();
        registry.register(OpenAIProvider::new());
        registry.register(OllamaProvider::new());

        let mut seen = Vec::new();
        registry.for_each_provider(|p| seen.push(p.name().to_string()));
        assert_eq!(seen, vec!["OpenAI", "Ollama"]);
    }

    #[tokio::test]
    async fn test_apply_all_updates_matching_providers() {
        let ollama = Arc::new(OllamaProvider::new());
        let mut registry = ProviderRegistry::new();
        registry.register_shared(ollama.clone());
        registry.register(MockAIProvider::new());

        let mut settings = BTreeMap::new();
        settings.insert("ollama".to_string(), json!({"model": "deepseek-coder"}));
        settings.insert("unknown".to_string(), json!({"model": "x"}));
        settings.insert("mock-ai".to_string(), json!({"model": "ignored"}));

        let errors = registry.apply_all(&settings).await;
        assert!(errors.is_empty());
        assert_eq!(ollama.model().await, "deepseek-coder");
    }

    #[tokio::test]
    async fn test_apply_all_reports_rejected_entries() {
        let mut registry = ProviderRegistry::new();
        registry.register(OllamaProvider::new());

        let mut settings = BTreeMap::new();
        settings.insert("ollama".to_string(), json!("not an object"));

        let errors = registry.apply_all(&settings).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].provider_id(), "ollama");
    }
}
