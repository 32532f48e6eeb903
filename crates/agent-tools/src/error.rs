use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApprovalError {
    #[error("path '{path}' resolves outside the project root {root}")]
    OutsideProject { path: String, root: PathBuf },

    #[error("change has an empty path")]
    EmptyPath,

    #[error("no pending item at index {index}")]
    NotFound { index: usize },

    #[error("item {index} has already been {state}")]
    AlreadyDecided { index: usize, state: &'static str },

    #[error("failed to apply change to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no live shell session '{session_id}'")]
    NoActiveSession { session_id: String },
}

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("failed to spawn {shell}: {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to capture {0} of shell process")]
    MissingPipe(&'static str),
}
