//! Sent-notification markers.
//!
//! A marker's presence means the conflict report for that exact
//! (source, target, commit) was already handled by an earlier run. Markers are
//! written once and never removed by merge-branch; deleting one by hand makes
//! the next run send the report again.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use super::OutgoingMail;
use crate::errors::NotificationError;

/// Identifies one conflict notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerKey {
    pub source: String,
    pub target: String,
    pub commit: String,
}

impl MarkerKey {
    pub fn new(source: impl Into<String>, target: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            commit: commit.into(),
        }
    }
}

/// Durable record of notifications already dispatched.
pub trait NotificationLedger: Send + Sync {
    fn has_notified(&self, key: &MarkerKey) -> Result<bool, NotificationError>;

    /// Persist that `mail` was dispatched (or deliberately suppressed) for
    /// `key`.
    fn record_notified(&self, key: &MarkerKey, mail: &OutgoingMail) -> Result<(), NotificationError>;

    /// Where the record for `key` lives, for operators who want to re-arm it.
    fn locate(&self, _key: &MarkerKey) -> Option<PathBuf> {
        None
    }
}

/// One marker file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileMarkerLedger {
    dir: PathBuf,
}

impl FileMarkerLedger {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Location of the marker for `key`.
    pub fn marker_path(&self, key: &MarkerKey) -> PathBuf {
        self.dir.join(format!(
            "sent_merge_notification_{}_{}_{}",
            escape_component(&key.source),
            escape_component(&key.target),
            escape_component(&key.commit),
        ))
    }
}

impl NotificationLedger for FileMarkerLedger {
    fn has_notified(&self, key: &MarkerKey) -> Result<bool, NotificationError> {
        let path = self.marker_path(key);
        debug!(path = %path.display(), "checking notification marker");
        path.try_exists().map_err(|source| NotificationError::MarkerError {
            path: path.display().to_string(),
            source,
        })
    }

    fn record_notified(&self, key: &MarkerKey, mail: &OutgoingMail) -> Result<(), NotificationError> {
        let path = self.marker_path(key);
        let contents = format!(
            "{}\n\nTo: {}\nCc: {}\n\n{}\n\nRecorded: {}\n",
            mail.subject,
            mail.to,
            mail.cc.join(","),
            mail.body,
            Utc::now().to_rfc3339(),
        );
        std::fs::create_dir_all(&self.dir)
            .and_then(|()| std::fs::write(&path, contents))
            .map_err(|source| NotificationError::MarkerError {
                path: path.display().to_string(),
                source,
            })?;
        debug!(path = %path.display(), "wrote notification marker");
        Ok(())
    }

    fn locate(&self, key: &MarkerKey) -> Option<PathBuf> {
        Some(self.marker_path(key))
    }
}

/// Percent-escape every byte outside `[A-Za-z0-9.-]` so that distinct
/// branch names can never produce the same file name.
fn escape_component(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> OutgoingMail {
        OutgoingMail {
            from: "merge-bot@example.com".into(),
            to: "alice@example.com".into(),
            cc: vec!["team@example.com".into()],
            subject: "Auto Merge failed".into(),
            body: "details".into(),
        }
    }

    #[test]
    fn test_escape_component() {
        assert_eq!(escape_component("main"), "main");
        assert_eq!(escape_component("release/1.2"), "release%2F1.2");
        assert_eq!(escape_component("a_b"), "a%5Fb");
    }

    #[test]
    fn test_marker_paths_are_unique_per_triple() {
        let ledger = FileMarkerLedger::new("/tmp");
        let a = ledger.marker_path(&MarkerKey::new("feature/x", "main", "abc"));
        let b = ledger.marker_path(&MarkerKey::new("bugfix/x", "main", "abc"));
        let c = ledger.marker_path(&MarkerKey::new("a_b", "c", "abc"));
        let d = ledger.marker_path(&MarkerKey::new("a", "b_c", "abc"));
        assert_ne!(a, b);
        assert_ne!(c, d);
        assert_eq!(
            a,
            PathBuf::from("/tmp/sent_merge_notification_feature%2Fx_main_abc")
        );
    }

    #[test]
    fn test_record_then_has_notified() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileMarkerLedger::new(dir.path());
        let key = MarkerKey::new("A", "B", "H");

        assert!(!ledger.has_notified(&key).unwrap());
        ledger.record_notified(&key, &mail()).unwrap();
        assert!(ledger.has_notified(&key).unwrap());
        assert!(!ledger
            .has_notified(&MarkerKey::new("A", "B", "other"))
            .unwrap());

        let contents = std::fs::read_to_string(ledger.marker_path(&key)).unwrap();
        assert!(contents.starts_with("Auto Merge failed\n\nTo: alice@example.com\nCc: team@example.com\n\ndetails"));
        assert!(contents.contains("Recorded: "));
    }

    #[test]
    fn test_record_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileMarkerLedger::new(dir.path().join("nested/markers"));
        let key = MarkerKey::new("A", "B", "H");
        ledger.record_notified(&key, &mail()).unwrap();
        assert!(ledger.has_notified(&key).unwrap());
    }
}
