//! Filesystem capability used by the approval workflow.

use std::io;
use std::path::Path;

use agent_core::listing::{list_project_files, ListingMode};
use async_trait::async_trait;
use tokio::fs;

#[async_trait]
pub trait ProjectFs: Send + Sync {
    async fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Replace the whole file, creating missing parent directories.
    async fn write_file(&self, path: &Path, content: &str) -> io::Result<()>;

    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Every file below `root`, relative and `/`-separated, sorted.
    async fn list_files(&self, root: &Path) -> io::Result<Vec<String>>;
}

/// The local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

#[async_trait]
impl ProjectFs for LocalFs {
    async fn read_file(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path).await
    }

    async fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }

    async fn list_files(&self, root: &Path) -> io::Result<Vec<String>> {
        list_project_files(root.to_path_buf(), ListingMode::Recursive { max_depth: None }).await
    }
}
