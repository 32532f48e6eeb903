//! Side-effecting capabilities behind the human approval gate: project
//! filesystem access, change path resolution, the approval workflow and
//! interactive shell sessions.

pub mod approval;
pub mod error;
pub mod fs;
pub mod path;
pub mod terminal;

pub use approval::{
    AppliedChange, ApprovalWorkflow, BulkApplyReport, DiffLine, DiffTag, FailedChange,
    PendingChange, PendingCommand, RefreshHook, ReviewState,
};
pub use error::{ApprovalError, TerminalError};
pub use fs::{LocalFs, ProjectFs};
pub use path::resolve_change_path;
pub use terminal::{default_shell, SessionInput, ShellEvent, ShellSessions};
