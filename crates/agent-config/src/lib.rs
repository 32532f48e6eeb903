//! Provider settings persistence.
//!
//! A single `settings.json` document holds the active provider id and the
//! per-provider configuration. See [`SettingsStore`].

pub mod paths;
pub mod settings;

pub use paths::{data_dir, settings_path, settings_path_in, DATA_DIR_ENV};
pub use settings::{
    ProviderSettings, Result, Settings, SettingsError, SettingsStore, DEFAULT_ACTIVE_PROVIDER,
};
