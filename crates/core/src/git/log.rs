//! Reading the queue of unmerged commits.
//!
//! Commits are requested from `git log` with fields joined by ASCII unit
//! separator (0x1F) and records terminated by ASCII record separator (0x1E).
//! Neither byte shows up in ordinary commit content; if one does, parsing
//! fails instead of silently mis-splitting the record.

use tracing::{debug, info};

use super::client::GitClient;
use crate::errors::{LogParseError, MergeError};
use crate::models::CommitRecord;

pub const FIELD_SEPARATOR: char = '\x1f';
pub const RECORD_SEPARATOR: char = '\x1e';

/// Placeholders in the same order as [`CommitRecord`]'s fields.
const FIELD_PLACEHOLDERS: [&str; 7] = ["%H", "%cn", "%ce", "%an", "%ae", "%ad", "%B"];

/// `--format` value for the commit log query.
pub fn log_format() -> String {
    format!("{}%x1e", FIELD_PLACEHOLDERS.join("%x1f"))
}

/// Commits in `source` that are not yet in `target`, oldest first.
pub async fn read_pending_commits(
    git: &GitClient,
    source: &str,
    target: &str,
) -> Result<Vec<CommitRecord>, MergeError> {
    let raw = git.log_unmerged(target, source, &log_format()).await?;
    let records = parse_log(&raw)?;
    if records.is_empty() {
        info!(source, target, "no commits found");
    } else {
        info!(count = records.len(), "found commits to merge, in this order:");
        for record in &records {
            info!(hash = %record.hash, "    queued");
        }
    }
    Ok(records)
}

/// Parse separator-delimited log output into records, oldest first.
///
/// `git log` prints newest first and terminates every record with
/// [`RECORD_SEPARATOR`], so the text after the last separator is a
/// formatting artifact that is always discarded.
pub fn parse_log(output: &str) -> Result<Vec<CommitRecord>, LogParseError> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut segments: Vec<&str> = output.split(RECORD_SEPARATOR).collect();
    let artifact = segments.pop().unwrap_or_default();
    if !artifact.trim().is_empty() {
        return Err(LogParseError::TrailingOutput(artifact.to_string()));
    }

    let mut records = segments
        .iter()
        .enumerate()
        .map(|(index, segment)| parse_record(index, segment))
        .collect::<Result<Vec<_>, _>>()?;
    records.reverse();

    debug!(count = records.len(), "parsed commit log");
    Ok(records)
}

fn parse_record(index: usize, segment: &str) -> Result<CommitRecord, LogParseError> {
    let fields: Vec<&str> = segment.trim().split(FIELD_SEPARATOR).collect();
    let [hash, committer_name, committer_email, author_name, author_email, date, message] =
        fields[..]
    else {
        return Err(LogParseError::FieldCount {
            index,
            found: fields.len(),
            expected: FIELD_PLACEHOLDERS.len(),
        });
    };
    if hash.is_empty() {
        return Err(LogParseError::EmptyHash { index });
    }

    Ok(CommitRecord {
        hash: hash.to_string(),
        committer_name: committer_name.to_string(),
        committer_email: committer_email.to_string(),
        author_name: author_name.to_string(),
        author_email: author_email.to_string(),
        date: date.to_string(),
        message: message.to_string(),
    })
}
