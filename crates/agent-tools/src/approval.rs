//! Human approval gate between proposed mutations and their effect.
//!
//! Every change and command from a response starts out `Proposed`. Changes
//! may enter review (which captures the on-disk baseline for a diff) and are
//! then either applied or rejected. Commands are only ever forwarded to a
//! live shell session on explicit confirmation. Applied and rejected items
//! are final.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_core::{Change, ChangeAction, Command, StructuredResponse};
use similar::{ChangeTag, TextDiff};

use crate::error::ApprovalError;
use crate::fs::ProjectFs;
use crate::path::{ensure_within_root, resolve_change_path};
use crate::terminal::SessionInput;

pub type Result<T> = std::result::Result<T, ApprovalError>;

/// Called after changes have been written so the caller can refresh its file view.
pub type RefreshHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Proposed,
    UnderReview,
    Applied,
    Rejected,
}

impl ReviewState {
    pub fn is_final(self) -> bool {
        matches!(self, ReviewState::Applied | ReviewState::Rejected)
    }

    pub fn label(self) -> &'static str {
        match self {
            ReviewState::Proposed => "proposed",
            ReviewState::UnderReview => "under review",
            ReviewState::Applied => "applied",
            ReviewState::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffTag {
    Equal,
    Insert,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub tag: DiffTag,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct PendingChange {
    pub change: Change,
    pub state: ReviewState,
    resolved_path: Option<PathBuf>,
    baseline: Option<String>,
    creation: bool,
}

impl PendingChange {
    fn new(change: Change) -> Self {
        Self {
            change,
            state: ReviewState::Proposed,
            resolved_path: None,
            baseline: None,
            creation: false,
        }
    }

    /// Resolved target, known once the change has entered review or been applied.
    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved_path.as_deref()
    }

    /// On-disk content captured when review began. Empty for a creation.
    pub fn baseline(&self) -> Option<&str> {
        self.baseline.as_deref()
    }

    /// True once review found no existing file at the target.
    pub fn is_creation(&self) -> bool {
        self.creation
    }

    fn proposed_content(&self) -> &str {
        match self.change.action {
            ChangeAction::Delete => "",
            _ => &self.change.content,
        }
    }

    /// Line diff between the review baseline and the proposed content.
    pub fn diff_lines(&self) -> Vec<DiffLine> {
        let old = self.baseline.as_deref().unwrap_or("");
        let new = self.proposed_content();
        TextDiff::from_lines(old, new)
            .iter_all_changes()
            .map(|change| DiffLine {
                tag: match change.tag() {
                    ChangeTag::Equal => DiffTag::Equal,
                    ChangeTag::Insert => DiffTag::Insert,
                    ChangeTag::Delete => DiffTag::Delete,
                },
                text: change.to_string_lossy().into_owned(),
            })
            .collect()
    }

    /// Unified diff with `a/` and `b/` headers.
    pub fn unified_diff(&self) -> String {
        let old = self.baseline.as_deref().unwrap_or("");
        let new = self.proposed_content();
        let old_header = format!("a/{}", self.change.path);
        let new_header = format!("b/{}", self.change.path);
        TextDiff::from_lines(old, new)
            .unified_diff()
            .context_radius(3)
            .header(&old_header, &new_header)
            .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub command: Command,
    pub state: ReviewState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct FailedChange {
    pub index: usize,
    pub path: String,
    pub error: ApprovalError,
}

/// Outcome of applying every undecided change in order.
#[derive(Debug, Default)]
pub struct BulkApplyReport {
    pub applied: Vec<AppliedChange>,
    pub failed: Vec<FailedChange>,
}

impl BulkApplyReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ApprovalWorkflow {
    project_root: PathBuf,
    fs: Arc<dyn ProjectFs>,
    changes: Vec<PendingChange>,
    commands: Vec<PendingCommand>,
    on_applied: Option<RefreshHook>,
}

impl ApprovalWorkflow {
    pub fn new(project_root: impl Into<PathBuf>, fs: Arc<dyn ProjectFs>) -> Self {
        Self {
            project_root: project_root.into(),
            fs,
            changes: Vec::new(),
            commands: Vec::new(),
            on_applied: None,
        }
    }

    pub fn with_refresh_hook(mut self, hook: RefreshHook) -> Self {
        self.on_applied = Some(hook);
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Replace the pending items with those of `response`.
    pub fn propose(&mut self, response: &StructuredResponse) {
        self.changes = response
            .changes
            .iter()
            .cloned()
            .map(PendingChange::new)
            .collect();
        self.commands = response
            .commands()
            .iter()
            .cloned()
            .map(|command| PendingCommand {
                command,
                state: ReviewState::Proposed,
            })
            .collect();
        log::debug!(
            "Proposed {} change(s) and {} command(s)",
            self.changes.len(),
            self.commands.len()
        );
    }

    pub fn changes(&self) -> &[PendingChange] {
        &self.changes
    }

    pub fn commands(&self) -> &[PendingCommand] {
        &self.commands
    }

    pub fn change(&self, index: usize) -> Result<&PendingChange> {
        self.changes
            .get(index)
            .ok_or(ApprovalError::NotFound { index })
    }

    fn undecided_change(&mut self, index: usize) -> Result<&mut PendingChange> {
        let pending = self
            .changes
            .get_mut(index)
            .ok_or(ApprovalError::NotFound { index })?;
        if pending.state.is_final() {
            return Err(ApprovalError::AlreadyDecided {
                index,
                state: pending.state.label(),
            });
        }
        Ok(pending)
    }

    /// Resolve the target and capture its current content for comparison.
    ///
    /// A missing or unreadable file makes the change a creation with an
    /// empty baseline.
    pub async fn begin_review(&mut self, index: usize) -> Result<&PendingChange> {
        let root = self.project_root.clone();
        let fs = self.fs.clone();
        let pending = self.undecided_change(index)?;

        let path = resolve_change_path(&root, &pending.change.path)?;
        ensure_within_root(&root, &path).await?;
        let (baseline, creation) = match fs.read_file(&path).await {
            Ok(content) => (content, false),
            Err(e) => {
                log::debug!("No baseline for {}: {}", path.display(), e);
                (String::new(), true)
            }
        };

        pending.resolved_path = Some(path);
        pending.baseline = Some(baseline);
        pending.creation = creation;
        pending.state = ReviewState::UnderReview;
        Ok(pending)
    }

    /// Commit exactly one change to disk and signal a refresh.
    pub async fn confirm(&mut self, index: usize) -> Result<PathBuf> {
        let path = self.commit(index).await?;
        self.refresh();
        Ok(path)
    }

    pub fn reject(&mut self, index: usize) -> Result<()> {
        let pending = self.undecided_change(index)?;
        pending.state = ReviewState::Rejected;
        log::debug!("Rejected change {} ({})", index, pending.change.path);
        Ok(())
    }

    /// Apply every undecided change in order, continuing past failures.
    ///
    /// Writes that succeeded are kept even when a later one fails.
    pub async fn apply_all(&mut self) -> BulkApplyReport {
        let mut report = BulkApplyReport::default();
        for index in 0..self.changes.len() {
            if self.changes[index].state.is_final() {
                continue;
            }
            match self.commit(index).await {
                Ok(path) => report.applied.push(AppliedChange { index, path }),
                Err(error) => {
                    log::warn!("Change {} failed: {}", index, error);
                    report.failed.push(FailedChange {
                        index,
                        path: self.changes[index].change.path.clone(),
                        error,
                    });
                }
            }
        }
        if !report.applied.is_empty() {
            self.refresh();
        }
        report
    }

    async fn commit(&mut self, index: usize) -> Result<PathBuf> {
        let root = self.project_root.clone();
        let fs = self.fs.clone();
        let pending = self.undecided_change(index)?;

        let path = match &pending.resolved_path {
            Some(path) => path.clone(),
            None => resolve_change_path(&root, &pending.change.path)?,
        };
        ensure_within_root(&root, &path).await?;

        let result = match pending.change.action {
            ChangeAction::Delete => fs.remove_file(&path).await,
            ChangeAction::Create | ChangeAction::Modify => {
                fs.write_file(&path, &pending.change.content).await
            }
        };
        result.map_err(|source| ApprovalError::Io {
            path: path.clone(),
            source,
        })?;

        log::info!("Applied {:?} to {}", pending.change.action, path.display());
        pending.resolved_path = Some(path.clone());
        pending.state = ReviewState::Applied;
        Ok(path)
    }

    fn refresh(&self) {
        if let Some(hook) = &self.on_applied {
            hook();
        }
    }

    /// Type the command, followed by a newline, into a live shell session.
    ///
    /// Nothing is observed about the command's effect beyond what the session reports.
    pub async fn forward_command(
        &mut self,
        index: usize,
        input: &dyn SessionInput,
        session_id: &str,
    ) -> Result<()> {
        let pending = self
            .commands
            .get_mut(index)
            .ok_or(ApprovalError::NotFound { index })?;
        if pending.state.is_final() {
            return Err(ApprovalError::AlreadyDecided {
                index,
                state: pending.state.label(),
            });
        }

        let line = format!("{}\n", pending.command.command);
        if !input.send_input(session_id, &line).await {
            return Err(ApprovalError::NoActiveSession {
                session_id: session_id.to_string(),
            });
        }
        pending.state = ReviewState::Applied;
        log::info!(
            "Forwarded command to session '{}': {}",
            session_id,
            pending.command.command
        );
        Ok(())
    }

    pub fn reject_command(&mut self, index: usize) -> Result<()> {
        let pending = self
            .commands
            .get_mut(index)
            .ok_or(ApprovalError::NotFound { index })?;
        if pending.state.is_final() {
            return Err(ApprovalError::AlreadyDecided {
                index,
                state: pending.state.label(),
            });
        }
        pending.state = ReviewState::Rejected;
        Ok(())
    }
}
