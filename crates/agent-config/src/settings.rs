//! Settings document and its memoized on-disk store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

pub const DEFAULT_ACTIVE_PROVIDER: &str = "ollama";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to access settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Per-provider configuration.
///
/// Keys other than `model` and `apiKey` are kept as-is and handed to the
/// provider untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProviderSettings {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Opaque form handed to a provider's `update_settings`.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub active_provider_id: String,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            "ollama".to_string(),
            ProviderSettings::with_model("codellama"),
        );
        providers.insert(
            "openai".to_string(),
            ProviderSettings::with_model("gpt-4-turbo-preview").api_key(""),
        );
        providers.insert("mock-ai".to_string(), ProviderSettings::with_model("mock"));

        Self {
            active_provider_id: DEFAULT_ACTIVE_PROVIDER.to_string(),
            providers,
        }
    }
}

impl Settings {
    pub fn provider(&self, id: &str) -> Option<&ProviderSettings> {
        self.providers.get(id)
    }

    pub fn provider_mut(&mut self, id: &str) -> &mut ProviderSettings {
        self.providers.entry(id.to_string()).or_default()
    }

    /// Per-provider settings keyed by id, as opaque JSON values.
    pub fn provider_values(&self) -> BTreeMap<String, serde_json::Value> {
        self.providers
            .iter()
            .map(|(id, settings)| (id.clone(), settings.to_value()))
            .collect()
    }
}

/// Reads and writes the settings document.
///
/// The first successful load is cached; `save` refreshes the cache before
/// writing so readers never observe the previous value after a save.
pub struct SettingsStore {
    path: PathBuf,
    cache: RwLock<Option<Settings>>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    /// Store backed by `settings.json` in the application data directory.
    pub fn open_default() -> Self {
        Self::new(crate::paths::settings_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Settings> {
        if let Some(settings) = self.cache.read().await.as_ref() {
            return Ok(settings.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(settings) = cache.as_ref() {
            return Ok(settings.clone());
        }

        let settings = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str::<Settings>(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!(
                        "Unreadable settings at {} ({}), replacing with defaults",
                        self.path.display(),
                        e
                    );
                    self.back_up_corrupt_file().await;
                    self.write_defaults().await?
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {}, writing defaults", self.path.display());
                self.write_defaults().await?
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        *cache = Some(settings.clone());
        Ok(settings)
    }

    pub async fn save(&self, settings: &Settings) -> Result<()> {
        *self.cache.write().await = Some(settings.clone());
        self.write(settings).await?;
        log::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    /// Forget the cached value so the next `load` reads the file again.
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }

    /// Where an unparseable settings file is moved before defaults replace it.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    async fn back_up_corrupt_file(&self) {
        let backup = self.backup_path();
        match tokio::fs::rename(&self.path, &backup).await {
            Ok(()) => log::warn!("Previous settings kept at {}", backup.display()),
            Err(e) => log::warn!("Failed to back up {}: {}", self.path.display(), e),
        }
    }

    async fn write_defaults(&self) -> Result<Settings> {
        let defaults = Settings::default();
        self.write(&defaults).await?;
        Ok(defaults)
    }

    async fn write(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SettingsError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let content =
            serde_json::to_string_pretty(settings).map_err(|source| SettingsError::Serialize {
                path: self.path.clone(),
                source,
            })?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|source| SettingsError::Io {
                path: self.path.clone(),
                source,
            })
    }
}
