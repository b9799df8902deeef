//! Conflict classification for failed merges.
//!
//! merge-branch never resolves conflicts. It only reads what `git merge`
//! printed and turns each `CONFLICT` line into a [`ConflictEntry`] for the
//! notification report.

pub mod classifier;

pub use classifier::{classify, paths_and_details, ConflictEntry, ConflictKind, UNKNOWN_PATH};
