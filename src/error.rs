use std::io;
use thiserror::Error;

/// Errors returned by the chat platform boundary.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The platform rejected an edit whose content equals the current content.
    #[error("message is not modified")]
    MessageNotModified,

    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The Bot API server refuses files of this size.
    #[error("file too large: {0}")]
    FileTooLarge(String),

    #[error("chat API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from running the external media tool.
#[derive(Debug, Error)]
pub enum TrimError {
    #[error("failed to start media tool: {0}")]
    Spawn(#[source] io::Error),

    #[error("media tool exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// Rejected settings input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid time '{0}', expected HH:MM:SS or MM:SS")]
    InvalidTime(String),
}

/// Everything that can end a job before it completes.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Trim(#[from] TrimError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{phase} timed out after {secs} seconds")]
    TimedOut { phase: &'static str, secs: u64 },
}

pub type JobResult<T> = Result<T, JobError>;
