//! Identity handling for bot-authored commits.
//!
//! Merge commits created by merge-branch carry the bot's identity. The
//! [`OriginalAuthorResolver`] walks their provenance back to a person so
//! conflict reports reach someone who can act on them.

pub mod resolver;

pub use resolver::{scripted_merge_reference, OriginalAuthorResolver};
