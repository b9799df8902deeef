//! Error types for the merge-branch core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and the
//! top-level [`MergeError`] enum unifies them for the merge loop and maps
//! every failure onto the process exit status the binary should report.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every way a merge run can stop short of processing the whole queue.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The working repository's remote is not the configured repository.
    #[error("repository remote is '{actual}' and does not match '{expected}'")]
    IdentityMismatch { expected: String, actual: String },

    /// A non-merge git command (checkout, log, push, show, ...) failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// The commit log could not be parsed into records.
    #[error(transparent)]
    Log(#[from] LogParseError),

    /// A merge stopped on conflicts; the report was handled and the run halts.
    #[error("merge of {commit} stopped on {conflicts} conflict(s) (exit {exit_code})")]
    MergeConflict {
        commit: String,
        conflicts: usize,
        exit_code: i32,
    },

    /// A merge failed without any recognisable conflict markers in its output.
    #[error("merge of {commit} failed without recognisable conflicts (exit {exit_code})")]
    UnclassifiedMergeFailure { commit: String, exit_code: i32 },

    /// The merge process ended without an exit status.
    #[error("merge of {commit} was terminated by a signal")]
    MergeTerminated { commit: String },

    /// A merge stopped on conflicts and the report could not be delivered.
    #[error("merge of {commit} stopped on conflicts (exit {exit_code}); report not delivered: {source}")]
    NotificationFailed {
        commit: String,
        exit_code: i32,
        #[source]
        source: NotificationError,
    },

    /// Recording a conflict notification failed.
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl MergeError {
    /// Process exit status for this error.
    ///
    /// External command failures propagate the command's own status; anything
    /// that cannot be represented as a non-zero byte becomes `1`.
    pub fn exit_code(&self) -> u8 {
        let raw = match self {
            Self::Git(GitError::CommandFailed { exit_code, .. }) => *exit_code,
            Self::MergeConflict { exit_code, .. } => *exit_code,
            Self::UnclassifiedMergeFailure { exit_code, .. } => *exit_code,
            Self::NotificationFailed { exit_code, .. } => *exit_code,
            _ => 1,
        };
        match u8::try_from(raw) {
            Ok(0) | Err(_) => 1,
            Ok(code) => code,
        }
    }
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from running the `git` binary.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status.
    #[error("`git {command}` failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Log parse errors
// ---------------------------------------------------------------------------

/// Errors from parsing separator-delimited `git log` output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogParseError {
    /// A record did not split into the expected number of fields, which means
    /// a reserved separator appeared inside commit content.
    #[error("log record {index} has {found} fields, expected {expected}")]
    FieldCount {
        index: usize,
        found: usize,
        expected: usize,
    },

    /// A record carried no commit hash.
    #[error("log record {index} has an empty commit hash")]
    EmptyHash { index: usize },

    /// Text followed the final record separator.
    #[error("unexpected trailing log output after the last record: {0:?}")]
    TrailingOutput(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

/// Errors from the notification subsystem (email, markers).
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Email could not be built or delivered.
    #[error("email notification failed: {0}")]
    EmailError(String),

    /// The message has no address it could ever be delivered to. Retrying
    /// cannot help.
    #[error("no deliverable address: {0}")]
    InvalidAddress(String),

    /// The notification marker could not be read or written.
    #[error("notification marker error at '{path}': {source}")]
    MarkerError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
