//! Domain model types used throughout merge-branch.

use chrono::{DateTime, Utc};
use regex_lite::Regex;

// ---------------------------------------------------------------------------
// Commit records
// ---------------------------------------------------------------------------

/// One commit waiting to be merged, as read from the first-parent log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub hash: String,
    pub committer_name: String,
    pub committer_email: String,
    pub author_name: String,
    pub author_email: String,
    pub date: String,
    pub message: String,
}

impl CommitRecord {
    /// Whether both author and committer are the automation itself.
    pub fn is_bot_authored(&self, bot_email: &str) -> bool {
        self.author_email == bot_email && self.committer_email == bot_email
    }
}

// ---------------------------------------------------------------------------
// Merge strategy
// ---------------------------------------------------------------------------

fn do_not_merge_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)DO\s+NOT\s+MERGE").expect("valid regex"))
}

/// How a single commit is merged onto the target branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Always-create-a-merge-commit merge of the commit's changes.
    Normal,
    /// Record the commit as merged while leaving the target tree unchanged.
    SkipContent,
}

impl MergeStrategy {
    /// Pick the strategy for a commit from its message.
    pub fn for_message(message: &str) -> Self {
        if do_not_merge_re().is_match(message) {
            Self::SkipContent
        } else {
            Self::Normal
        }
    }

    /// Message of the merge commit created for `hash`.
    pub fn commit_message(&self, hash: &str, source: &str) -> String {
        match self {
            Self::Normal => format!("Scripted merge of {} from branch {}", hash, source),
            Self::SkipContent => format!(
                "SKIPPED MERGE OF {} from branch {}. DO NOT MERGE",
                hash, source
            ),
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::SkipContent => write!(f, "skip_content"),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge outcome
// ---------------------------------------------------------------------------

/// Result of one merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    /// The merge exited non-zero; `output` is stdout followed by stderr.
    Conflicted { output: String, exit_code: i32 },
    /// The merge process ended without an exit status (killed by a signal).
    Terminated,
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Commits merged with their changes, oldest first.
    pub merged: Vec<String>,
    /// Do-not-merge commits recorded without their changes.
    pub skipped: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            merged: Vec::new(),
            skipped: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Total commits taken off the queue.
    pub fn processed(&self) -> usize {
        self.merged.len() + self.skipped.len()
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
