use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agent_config::{Settings, SettingsStore};
use agent_core::{ContextAssembler, ConversationTurn, Role, StructuredResponse};
use agent_llm::{LLMError, ProviderRegistry, SharedProvider};
use tokio::sync::{Mutex, RwLock};

use crate::error::{OrchestratorError, Result};

/// Clears the in-flight flag when the prompt finishes, fails or is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Id and display name of a registered provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
}

/// Settings that were applied, and the providers that refused their entry.
#[derive(Debug)]
pub struct AppliedSettings {
    pub settings: Settings,
    pub rejected: Vec<LLMError>,
}

pub struct Orchestrator {
    registry: RwLock<ProviderRegistry>,
    settings: Arc<SettingsStore>,
    context: Mutex<ContextAssembler>,
    in_flight: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        registry: ProviderRegistry,
        settings: Arc<SettingsStore>,
        context: ContextAssembler,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            settings,
            context: Mutex::new(context),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Load persisted settings and push them into the registry.
    ///
    /// A provider rejecting its entry does not fail startup; the rejections
    /// are returned alongside the settings.
    pub async fn initialize(&self) -> Result<AppliedSettings> {
        let settings = self.settings.load().await?;
        let rejected = self.apply_settings(&settings).await;
        Ok(AppliedSettings { settings, rejected })
    }

    pub async fn get_settings(&self) -> Result<Settings> {
        Ok(self.settings.load().await?)
    }

    /// Persist `settings` and apply them to the live providers.
    ///
    /// The new values are applied even when the disk write fails, since the
    /// store's cache already holds them; the write error is still returned.
    /// On success, yields the errors of providers that rejected their entry.
    pub async fn save_settings(&self, settings: Settings) -> Result<Vec<LLMError>> {
        let saved = self.settings.save(&settings).await;
        let rejected = self.apply_settings(&settings).await;
        saved?;
        Ok(rejected)
    }

    /// Select the active provider and hand each provider its configuration.
    ///
    /// Returns the errors of providers that rejected their entry.
    pub async fn apply_settings(&self, settings: &Settings) -> Vec<LLMError> {
        let mut registry = self.registry.write().await;
        if !registry.set_active_provider(&settings.active_provider_id) {
            log::warn!(
                "Settings select unknown provider '{}'; keeping {:?}",
                settings.active_provider_id,
                registry.active_provider_id()
            );
        }
        let registry = registry.downgrade();
        registry.apply_all(&settings.provider_values()).await
    }

    pub async fn active_provider_id(&self) -> Option<String> {
        self.registry
            .read()
            .await
            .active_provider_id()
            .map(str::to_string)
    }

    pub async fn providers(&self) -> Vec<ProviderInfo> {
        let registry = self.registry.read().await;
        let mut providers = Vec::with_capacity(registry.len());
        registry.for_each_provider(|p| {
            providers.push(ProviderInfo {
                id: p.id().to_string(),
                name: p.name().to_string(),
            })
        });
        providers
    }

    async fn active_provider(&self) -> Result<SharedProvider> {
        self.registry
            .read()
            .await
            .active_provider()
            .ok_or(OrchestratorError::NoActiveProvider)
    }

    /// Run one exchange with the active provider.
    ///
    /// The prompt is recorded in history before the provider is called; the
    /// response summary is recorded only if the call succeeds. Only one
    /// prompt may be outstanding at a time.
    pub async fn handle_prompt(
        &self,
        prompt: &str,
        active_file_path: Option<&str>,
        project_root: &Path,
    ) -> Result<StructuredResponse> {
        let _guard =
            InFlightGuard::acquire(&self.in_flight).ok_or(OrchestratorError::PromptInFlight)?;

        let provider = self.active_provider().await?;

        let mut context = self.context.lock().await;
        let snapshot = context
            .build_context(active_file_path, project_root)
            .await;
        context.add_history(Role::User, prompt);
        drop(context);

        log::info!("Sending prompt to provider '{}'", provider.id());
        let response = provider.generate_response(prompt, &snapshot).await?;

        self.context
            .lock()
            .await
            .add_history(Role::Assistant, response.summary.clone());
        Ok(response)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.context.lock().await.history().snapshot()
    }

    pub async fn clear_history(&self) {
        self.context.lock().await.clear_history();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = InFlightGuard::acquire(&flag).unwrap();
        assert!(InFlightGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(InFlightGuard::acquire(&flag).is_some());
    }
}
