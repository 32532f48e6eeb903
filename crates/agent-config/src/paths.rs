use std::path::{Path, PathBuf};

/// Overrides the application data directory when set.
pub const DATA_DIR_ENV: &str = "AGENT_DESK_DATA_DIR";

pub const APP_DIR_NAME: &str = "agent-desk";

pub const SETTINGS_FILE: &str = "settings.json";

/// Application data directory (`$AGENT_DESK_DATA_DIR`, else `<config dir>/agent-desk`).
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

/// Settings document inside `dir`.
pub fn settings_path_in(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE)
}

pub fn settings_path() -> PathBuf {
    settings_path_in(&data_dir())
}
