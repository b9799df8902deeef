//! Git operations for merge-branch.

pub mod client;
pub mod log;
pub mod runner;

pub use client::GitClient;
pub use log::{parse_log, read_pending_commits};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
