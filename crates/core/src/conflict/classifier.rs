//! Conflict classification of raw `git merge` output.
//!
//! Only lines starting with `CONFLICT (` are considered. Each one is matched
//! against the message shapes git prints for content, delete and rename/add
//! conflicts; anything else is kept verbatim with an unknown path.

use regex_lite::Regex;
use tracing::debug;

/// Path reported for conflict lines whose shape is not recognised.
pub const UNKNOWN_PATH: &str = "(unknown)";

const CONFLICT_PREFIX: &str = "CONFLICT (";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which message shape a conflict line had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// `CONFLICT (<kind>): Merge conflict in <path>`
    Content,
    /// `CONFLICT (<kind>/delete): <path> deleted in ... and ... in .... Version ...`
    Delete,
    /// `CONFLICT (rename/add): Rename <old>-><path> in ...`
    RenameAdd,
    /// Any other `CONFLICT (` line.
    Unrecognised,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::Delete => write!(f, "delete"),
            Self::RenameAdd => write!(f, "rename_add"),
            Self::Unrecognised => write!(f, "unrecognised"),
        }
    }
}

/// One conflicted path from a failed merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    pub path: String,
    /// The conflict description following `CONFLICT `, or the raw line when
    /// unrecognised.
    pub detail: String,
    pub kind: ConflictKind,
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

fn conflict_patterns() -> &'static [(ConflictKind, Regex); 3] {
    static PATTERNS: std::sync::OnceLock<[(ConflictKind, Regex); 3]> = std::sync::OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                ConflictKind::Content,
                Regex::new(r"^CONFLICT (?P<detail>\(.*\): Merge conflict in (?P<path>.*))")
                    .expect("valid regex"),
            ),
            (
                ConflictKind::Delete,
                Regex::new(
                    r"^CONFLICT (?P<detail>\(.*/delete\): (?P<path>.*) deleted in .* and .* in .*)\. Version ",
                )
                .expect("valid regex"),
            ),
            (
                ConflictKind::RenameAdd,
                Regex::new(r"^CONFLICT (?P<detail>\(rename/add\): Rename .*->(?P<path>.*?) in .*)")
                    .expect("valid regex"),
            ),
        ]
    })
}

/// Classify a single `CONFLICT (` line; the first matching shape wins.
pub fn classify_line(line: &str) -> ConflictEntry {
    for (kind, pattern) in conflict_patterns() {
        if let Some(caps) = pattern.captures(line) {
            if let (Some(path), Some(detail)) = (caps.name("path"), caps.name("detail")) {
                return ConflictEntry {
                    path: path.as_str().to_string(),
                    detail: detail.as_str().to_string(),
                    kind: *kind,
                };
            }
        }
    }
    ConflictEntry {
        path: UNKNOWN_PATH.to_string(),
        detail: line.to_string(),
        kind: ConflictKind::Unrecognised,
    }
}

/// Extract every conflict from the captured output of one merge, in order.
pub fn classify(output: &str) -> Vec<ConflictEntry> {
    let entries: Vec<ConflictEntry> = output
        .lines()
        .filter(|line| line.starts_with(CONFLICT_PREFIX))
        .map(classify_line)
        .collect();
    debug!(count = entries.len(), "classified merge conflicts");
    entries
}

/// Split entries into the parallel path and detail lists used by reports.
pub fn paths_and_details(entries: &[ConflictEntry]) -> (Vec<&str>, Vec<&str>) {
    entries
        .iter()
        .map(|e| (e.path.as_str(), e.detail.as_str()))
        .unzip()
}
