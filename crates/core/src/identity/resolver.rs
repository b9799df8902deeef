//! Finding the human behind a bot-authored merge commit.
//!
//! When a branch is itself fed by merge-branch, commits on it are authored by
//! the bot and carry a `Scripted merge of <sha>` message. Following those
//! references back leads to the commit a person actually wrote.

use std::collections::HashSet;

use regex_lite::Regex;
use tracing::{debug, info, warn};

use crate::errors::GitError;
use crate::git::GitClient;

fn scripted_merge_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Scripted merge of ([0-9a-f]{40})").expect("valid regex"))
}

/// The commit hash a scripted merge message refers to, if any.
pub fn scripted_merge_reference(message: &str) -> Option<&str> {
    scripted_merge_re()
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Resolves the original author email through chains of scripted merges.
pub struct OriginalAuthorResolver<'a> {
    git: &'a GitClient,
    bot_email: &'a str,
    max_depth: usize,
}

impl<'a> OriginalAuthorResolver<'a> {
    pub fn new(git: &'a GitClient, bot_email: &'a str, max_depth: usize) -> Self {
        Self {
            git,
            bot_email,
            max_depth,
        }
    }

    /// Follow scripted-merge references starting at `message` until a
    /// non-bot author is found.
    ///
    /// Returns `Ok(None)` when the message carries no reference, when a chain
    /// of bot commits ends without one, or when the walk revisits a commit or
    /// exceeds the configured depth.
    pub async fn resolve(&self, message: &str) -> Result<Option<String>, GitError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut message = message.to_string();

        loop {
            let Some(hash) = scripted_merge_reference(&message).map(str::to_string) else {
                return Ok(None);
            };
            if !visited.insert(hash.clone()) {
                warn!(%hash, "scripted merge chain loops back on itself; giving up");
                return Ok(None);
            }
            if visited.len() > self.max_depth {
                warn!(
                    max_depth = self.max_depth,
                    "scripted merge chain exceeds maximum depth; giving up"
                );
                return Ok(None);
            }

            info!(%hash, "scripted merge detected");
            let email = self.git.author_email(&hash).await?;
            if email != self.bot_email {
                debug!(%hash, %email, "resolved original author");
                return Ok(Some(email));
            }
            message = self.git.commit_message(&hash).await?;
        }
    }
}
