//! Context assembly.
//!
//! Builds a fresh [`ProjectSnapshot`] for every request. Every filesystem
//! failure here is recovered locally: the snapshot simply lacks the piece
//! that could not be read.

use std::path::{Path, PathBuf};

use crate::history::{ConversationHistory, DEFAULT_HISTORY_LIMIT};
use crate::listing::{list_project_files, ListingMode};
use crate::types::{ActiveFile, ProjectSnapshot, Role};

/// Maximum number of characters of the active file sent to a provider.
pub const DEFAULT_ACTIVE_FILE_BUDGET: usize = 5000;

/// Dedicated project metadata file, read from the project root.
pub const METADATA_FILE: &str = ".vibe.json";

/// Metadata source used when the dedicated file is missing and fallback is on.
pub const PACKAGE_MANIFEST: &str = "package.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    pub active_file_budget: usize,
    pub history_limit: usize,
    pub listing: ListingMode,
    pub metadata_fallback: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            active_file_budget: DEFAULT_ACTIVE_FILE_BUDGET,
            history_limit: DEFAULT_HISTORY_LIMIT,
            listing: ListingMode::Flat,
            metadata_fallback: false,
        }
    }
}

impl ContextOptions {
    pub fn with_listing(mut self, listing: ListingMode) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_metadata_fallback(mut self, enabled: bool) -> Self {
        self.metadata_fallback = enabled;
        self
    }

    pub fn with_active_file_budget(mut self, budget: usize) -> Self {
        self.active_file_budget = budget;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}

/// Owns the session history and snapshots the project on demand.
#[derive(Debug)]
pub struct ContextAssembler {
    options: ContextOptions,
    history: ConversationHistory,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(ContextOptions::default())
    }
}

impl ContextAssembler {
    pub fn new(options: ContextOptions) -> Self {
        let history = ConversationHistory::new(options.history_limit);
        Self { options, history }
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn add_history(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(role, content);
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub async fn build_context(
        &self,
        active_file_path: Option<&str>,
        project_root: &Path,
    ) -> ProjectSnapshot {
        let active_file = match active_file_path {
            Some(path) if !path.is_empty() => self.read_active_file(path, project_root).await,
            _ => None,
        };

        let metadata = read_metadata(project_root, self.options.metadata_fallback).await;

        let project_files =
            match list_project_files(project_root.to_path_buf(), self.options.listing).await {
                Ok(files) => files,
                Err(e) => {
                    log::warn!(
                        "Failed to list project files under {}: {}",
                        project_root.display(),
                        e
                    );
                    Vec::new()
                }
            };

        ProjectSnapshot {
            active_file,
            project_files,
            recent_history: self.history.snapshot(),
            metadata,
        }
    }

    async fn read_active_file(&self, path: &str, project_root: &Path) -> Option<ActiveFile> {
        let full_path = resolve_against(path, project_root);
        match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => Some(ActiveFile {
                path: path.to_string(),
                content: truncate_chars(&content, self.options.active_file_budget),
            }),
            Err(e) => {
                log::warn!(
                    "Failed to read active file {} for context: {}",
                    full_path.display(),
                    e
                );
                None
            }
        }
    }
}

fn resolve_against(path: &str, project_root: &Path) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        project_root.join(candidate)
    }
}

/// Prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// `Err(())` when the file is absent; `Ok(None)` when it exists but is unusable.
async fn read_json_document(path: &Path) -> Result<Option<serde_json::Value>, ()> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(()),
        Err(e) => {
            log::debug!("Failed to read metadata {}: {}", path.display(), e);
            return Ok(None);
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::debug!("Ignoring unparseable metadata {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

/// The manifest is consulted only when the dedicated file does not exist.
async fn read_metadata(project_root: &Path, fallback: bool) -> Option<serde_json::Value> {
    match read_json_document(&project_root.join(METADATA_FILE)).await {
        Ok(value) => value,
        Err(()) if fallback => read_json_document(&project_root.join(PACKAGE_MANIFEST))
            .await
            .ok()
            .flatten(),
        Err(()) => None,
    }
}
