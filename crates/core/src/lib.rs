//! merge-branch core library.
//!
//! Automates forward-merging one branch into another, commit by commit:
//! repository verification, commit log parsing, merging and pushing,
//! conflict classification, original-author resolution for bot commits, and
//! deduplicated conflict notifications.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod git;
pub mod guard;
pub mod identity;
pub mod merge_loop;
pub mod models;
pub mod notify;

// Re-exports for convenience.
pub use config::AppConfig;
pub use errors::MergeError;
pub use git::GitClient;
pub use merge_loop::{MergeLoop, MergeSettings};
pub use models::RunSummary;
