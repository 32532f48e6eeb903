//! Deterministic project file listings.
//!
//! Both listings skip infrastructure directories at every depth and return
//! entries sorted lexicographically, so two listings of an unchanged tree are
//! identical.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Directory names never listed: version control, dependency caches, build output.
pub const EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "dist", "dist-electron", "target"];

/// Depth used for recursive context listings.
pub const DEFAULT_MAX_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingMode {
    /// Names of the top-level entries (files and directories).
    #[default]
    Flat,
    /// Relative paths of files, `max_depth` levels below the root at most.
    Recursive { max_depth: Option<usize> },
}

pub fn is_excluded_dir(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name)
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn list_top_level(root: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && is_excluded_dir(&name) {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

pub fn list_recursive(root: &Path, max_depth: Option<usize>) -> io::Result<Vec<String>> {
    let mut walker = WalkDir::new(root).follow_links(false).min_depth(1);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    let mut files = Vec::new();
    let entries = walker.into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !(entry.file_type().is_dir()
                && is_excluded_dir(&entry.file_name().to_string_lossy()))
    });

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                log::debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(to_slash(relative));
        }
    }

    files.sort();
    Ok(files)
}

/// Lists `root` according to `mode` without blocking the async runtime.
pub async fn list_project_files(root: PathBuf, mode: ListingMode) -> io::Result<Vec<String>> {
    tokio::task::spawn_blocking(move || match mode {
        ListingMode::Flat => list_top_level(&root),
        ListingMode::Recursive { max_depth } => list_recursive(&root, max_depth),
    })
    .await
    .map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested/deeper")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("lib/dist")).unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("src/main.ts"), "main").unwrap();
        fs::write(root.join("src/nested/mod.ts"), "mod").unwrap();
        fs::write(root.join("src/nested/deeper/far.ts"), "far").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        fs::write(root.join("lib/dist/out.js"), "out").unwrap();
        fs::write(root.join("lib/index.ts"), "lib").unwrap();
        dir
    }

    #[test]
    fn test_top_level_is_sorted_and_skips_infrastructure() {
        let dir = sample_tree();
        let names = list_top_level(dir.path()).unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt", "lib", "src"]);
    }

    #[test]
    fn test_recursive_skips_excluded_dirs_at_every_depth() {
        let dir = sample_tree();
        let files = list_recursive(dir.path(), None).unwrap();
        assert_eq!(
            files,
            vec![
                "a.txt",
                "b.txt",
                "lib/index.ts",
                "src/main.ts",
                "src/nested/deeper/far.ts",
                "src/nested/mod.ts",
            ]
        );
    }

    #[test]
    fn test_recursive_respects_max_depth() {
        let dir = sample_tree();
        let files = list_recursive(dir.path(), Some(3)).unwrap();
        assert!(files.contains(&"src/nested/mod.ts".to_string()));
        assert!(!files.contains(&"src/nested/deeper/far.ts".to_string()));
    }

    #[test]
    fn test_listing_is_deterministic() {
        let dir = sample_tree();
        let first = list_recursive(dir.path(), Some(DEFAULT_MAX_DEPTH)).unwrap();
        let second = list_recursive(dir.path(), Some(DEFAULT_MAX_DEPTH)).unwrap();
        assert_eq!(first, second);
        assert_eq!(list_top_level(dir.path()).unwrap(), list_top_level(dir.path()).unwrap());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(list_top_level(&missing).is_err());
        assert!(list_recursive(&missing, None).is_err());
    }

    #[tokio::test]
    async fn test_async_listing_matches_sync() {
        let dir = sample_tree();
        let files = list_project_files(dir.path().to_path_buf(), ListingMode::Flat)
            .await
            .unwrap();
        assert_eq!(files, list_top_level(dir.path()).unwrap());
    }
}
