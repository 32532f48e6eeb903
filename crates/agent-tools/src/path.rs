//! Resolution of untrusted change paths against the project root.
//!
//! Separators are normalised to `/`. A path that already starts with the
//! project root (on a segment boundary) is kept where it is; anything else
//! relative is joined under the root. Absolute paths elsewhere, and `..`
//! segments climbing above the root, are rejected. [`ensure_within_root`]
//! repeats the check against the filesystem so symlinks cannot lead out.

use std::path::{Path, PathBuf};

use crate::error::ApprovalError;

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || has_drive_prefix(path)
}

/// Remainder of `path` below `root`, if `path` lies under it.
fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(root)?;
    if root.ends_with('/') {
        return Some(rest);
    }
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

/// Lexically fold `.` and `..`; `None` when `..` would leave the root.
fn fold_segments(relative: &str) -> Option<Vec<&str>> {
    let mut segments = Vec::new();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments)
}

pub fn resolve_change_path(project_root: &Path, path: &str) -> Result<PathBuf, ApprovalError> {
    let normalized = normalize_separators(path.trim());
    if normalized.is_empty() {
        return Err(ApprovalError::EmptyPath);
    }

    let root = normalize_separators(&project_root.to_string_lossy());
    let root = if root.len() > 1 {
        root.trim_end_matches('/').to_string()
    } else {
        root
    };

    let relative = match strip_root(&normalized, &root) {
        Some(rest) => rest,
        None if is_absolute(&normalized) => {
            return Err(ApprovalError::OutsideProject {
                path: path.to_string(),
                root: project_root.to_path_buf(),
            })
        }
        None => normalized.as_str(),
    };

    let segments = fold_segments(relative).ok_or_else(|| ApprovalError::OutsideProject {
        path: path.to_string(),
        root: project_root.to_path_buf(),
    })?;
    if segments.is_empty() {
        return Err(ApprovalError::EmptyPath);
    }

    let mut resolved = project_root.to_path_buf();
    resolved.extend(segments);
    Ok(resolved)
}

fn outside(project_root: &Path, resolved: &Path) -> ApprovalError {
    ApprovalError::OutsideProject {
        path: resolved.display().to_string(),
        root: project_root.to_path_buf(),
    }
}

/// Reject a resolved target whose deepest existing ancestor, with symlinks
/// followed, is not under the canonical project root.
///
/// A dangling symlink on the way is rejected, since writing through it could
/// create a file anywhere. A root that does not exist yet leaves only the
/// lexical check.
pub async fn ensure_within_root(project_root: &Path, resolved: &Path) -> Result<(), ApprovalError> {
    let canonical_root = match tokio::fs::canonicalize(project_root).await {
        Ok(root) => root,
        Err(_) => return Ok(()),
    };

    for ancestor in resolved.ancestors() {
        if !ancestor.starts_with(project_root) {
            break;
        }
        if tokio::fs::symlink_metadata(ancestor).await.is_err() {
            continue;
        }
        return match tokio::fs::canonicalize(ancestor).await {
            Ok(canonical) if canonical.starts_with(&canonical_root) => Ok(()),
            Ok(canonical) => {
                log::warn!(
                    "{} leaves the project through {}",
                    resolved.display(),
                    canonical.display()
                );
                Err(outside(project_root, resolved))
            }
            Err(_) => Err(outside(project_root, resolved)),
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_joins_under_root() {
        let resolved = resolve_change_path(Path::new("/proj"), "src/x.ts").unwrap();
        assert_eq!(resolved, PathBuf::from("/proj/src/x.ts"));
    }

    #[test]
    fn rooted_path_is_kept() {
        let resolved = resolve_change_path(Path::new("/proj"), "/proj/src/x.ts").unwrap();
        assert_eq!(resolved, PathBuf::from("/proj/src/x.ts"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let root = Path::new("/proj");
        let once = resolve_change_path(root, "src/x.ts").unwrap();
        let twice = resolve_change_path(root, &once.to_string_lossy()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn backslashes_are_normalized() {
        let resolved = resolve_change_path(Path::new("/proj"), "src\\lib\\x.ts").unwrap();
        assert_eq!(resolved, PathBuf::from("/proj/src/lib/x.ts"));
    }

    #[test]
    fn trailing_slash_on_root_is_ignored() {
        let resolved = resolve_change_path(Path::new("/proj/"), "/proj/a.txt").unwrap();
        assert_eq!(resolved, PathBuf::from("/proj/a.txt"));
    }

    #[test]
    fn absolute_path_outside_root_is_rejected() {
        let err = resolve_change_path(Path::new("/proj"), "/etc/passwd").unwrap_err();
        assert!(matches!(err, ApprovalError::OutsideProject { .. }));

        let err = resolve_change_path(Path::new("/proj"), "C:\\Windows\\x.dll").unwrap_err();
        assert!(matches!(err, ApprovalError::OutsideProject { .. }));
    }

    #[test]
    fn sibling_with_shared_prefix_is_rejected() {
        let err = resolve_change_path(Path::new("/proj"), "/project2/x.ts").unwrap_err();
        assert!(matches!(err, ApprovalError::OutsideProject { .. }));
    }

    #[test]
    fn parent_segments_cannot_escape() {
        let err = resolve_change_path(Path::new("/proj"), "../outside.txt").unwrap_err();
        assert!(matches!(err, ApprovalError::OutsideProject { .. }));

        let err = resolve_change_path(Path::new("/proj"), "/proj/src/../../x").unwrap_err();
        assert!(matches!(err, ApprovalError::OutsideProject { .. }));

        let resolved = resolve_change_path(Path::new("/proj"), "src/../lib/./a.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/proj/lib/a.rs"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_directory_cannot_lead_outside() {
        let root = tempfile::TempDir::new().unwrap();
        let elsewhere = tempfile::TempDir::new().unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), root.path().join("linkdir")).unwrap();

        let resolved = resolve_change_path(root.path(), "linkdir/x.txt").unwrap();
        assert!(matches!(
            ensure_within_root(root.path(), &resolved).await,
            Err(ApprovalError::OutsideProject { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_symlink_is_rejected() {
        let root = tempfile::TempDir::new().unwrap();
        std::os::unix::fs::symlink("/nonexistent/target.txt", root.path().join("ghost.txt"))
            .unwrap();

        let resolved = resolve_change_path(root.path(), "ghost.txt").unwrap();
        assert!(ensure_within_root(root.path(), &resolved).await.is_err());
    }

    #[tokio::test]
    async fn new_files_inside_root_are_contained() {
        let root = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("src")).unwrap();

        let nested = resolve_change_path(root.path(), "src/deep/new/file.rs").unwrap();
        ensure_within_root(root.path(), &nested).await.unwrap();

        let missing_root = root.path().join("not-created-yet");
        let target = resolve_change_path(&missing_root, "a.txt").unwrap();
        ensure_within_root(&missing_root, &target).await.unwrap();
    }

    #[test]
    fn empty_paths_are_rejected() {
        assert!(matches!(
            resolve_change_path(Path::new("/proj"), "  "),
            Err(ApprovalError::EmptyPath)
        ));
        assert!(matches!(
            resolve_change_path(Path::new("/proj"), "/proj"),
            Err(ApprovalError::EmptyPath)
        ));
    }
}
