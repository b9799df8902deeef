//! The merge loop.
//!
//! [`MergeLoop`] merges every commit of the source branch that is missing
//! from the target branch, one at a time and oldest first:
//!
//! 1. Verify the repository and reset both branches to the remote.
//! 2. Read the first-parent queue of unmerged commits.
//! 3. Merge each commit and push the target after every success.
//! 4. On the first conflict, notify the commit's author once and halt.
//!
//! Only full success on a commit advances the loop; every other outcome ends
//! the run with an error carrying the exit status to report.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::config::{AppConfig, SendFailurePolicy};
use crate::conflict::{classify, ConflictEntry};
use crate::errors::{MergeError, NotificationError};
use crate::git::{read_pending_commits, GitClient};
use crate::guard;
use crate::identity::OriginalAuthorResolver;
use crate::models::{CommitRecord, MergeOutcome, MergeStrategy, RunSummary};
use crate::notify::{
    ConflictReport, MailSender, MarkerKey, NotificationLedger, OutgoingMail, ReportContext,
};

/// Everything a run needs to know besides its collaborators.
#[derive(Debug, Clone)]
pub struct MergeSettings {
    /// Expected URL of the tracked remote.
    pub repo: String,
    pub source: String,
    pub target: String,
    pub bot_email: String,
    pub max_resolution_depth: usize,
    /// Whether conflict reports are delivered. Markers are written either way.
    pub notifications_enabled: bool,
    pub from: String,
    pub cc: Vec<String>,
    pub on_send_failure: SendFailurePolicy,
    pub build_url: Option<String>,
    pub process_doc_url: Option<String>,
}

impl MergeSettings {
    pub fn from_config(
        config: &AppConfig,
        repo: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            source: source.into(),
            target: target.into(),
            bot_email: config.identity.bot_email.clone(),
            max_resolution_depth: config.identity.max_resolution_depth,
            notifications_enabled: config.notifications.enabled,
            from: config.sender(),
            cc: config.notifications.cc.clone(),
            on_send_failure: config.notifications.on_send_failure,
            build_url: config.notifications.build_url.clone(),
            process_doc_url: config.notifications.process_doc_url.clone(),
        }
    }

    fn report_context(&self) -> ReportContext {
        ReportContext {
            repo: self.repo.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
            build_url: self.build_url.clone(),
            process_doc_url: self.process_doc_url.clone(),
        }
    }
}

/// Drives one run from guard to the end of the queue or the first failure.
pub struct MergeLoop {
    git: GitClient,
    mailer: Arc<dyn MailSender>,
    ledger: Arc<dyn NotificationLedger>,
    settings: MergeSettings,
}

impl MergeLoop {
    pub fn new(
        git: GitClient,
        mailer: Arc<dyn MailSender>,
        ledger: Arc<dyn NotificationLedger>,
        settings: MergeSettings,
    ) -> Self {
        Self {
            git,
            mailer,
            ledger,
            settings,
        }
    }

    // -----------------------------------------------------------------------
    // Main entry point
    // -----------------------------------------------------------------------

    /// Execute one run.
    ///
    /// Returns what was merged, or the error that stopped the run. An empty
    /// queue is a successful run with nothing processed.
    #[instrument(skip(self), fields(source = %self.settings.source, target = %self.settings.target))]
    pub async fn run(&self) -> Result<RunSummary, MergeError> {
        let mut summary = RunSummary::new();
        let s = &self.settings;

        guard::verify_and_sync(&self.git, &s.repo, &s.source, &s.target).await?;
        let commits = read_pending_commits(&self.git, &s.source, &s.target).await?;

        for commit in &commits {
            self.merge_commit(commit, &mut summary).await?;
        }

        summary.completed_at = Some(Utc::now());
        info!(
            merged = summary.merged.len(),
            skipped = summary.skipped.len(),
            "merge run complete"
        );
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Per-commit processing
    // -----------------------------------------------------------------------

    async fn merge_commit(
        &self,
        commit: &CommitRecord,
        summary: &mut RunSummary,
    ) -> Result<(), MergeError> {
        let s = &self.settings;
        let strategy = MergeStrategy::for_message(&commit.message);
        info!(hash = %commit.hash, %strategy, "merging commit");

        match self.git.merge(&commit.hash, strategy, &s.source).await? {
            MergeOutcome::Merged => {
                self.git.push(&s.target).await?;
                info!(hash = %commit.hash, target = %s.target, "merged and pushed");
                match strategy {
                    MergeStrategy::Normal => summary.merged.push(commit.hash.clone()),
                    MergeStrategy::SkipContent => summary.skipped.push(commit.hash.clone()),
                }
                Ok(())
            }
            MergeOutcome::Conflicted { output, exit_code } => {
                Err(self.handle_failed_merge(commit, &output, exit_code).await)
            }
            MergeOutcome::Terminated => {
                error!(hash = %commit.hash, "merge terminated without an exit status");
                Err(MergeError::MergeTerminated {
                    commit: commit.hash.clone(),
                })
            }
        }
    }

    /// Turn a non-zero merge into the error that ends the run, notifying the
    /// author on the way when the output shows conflicts.
    async fn handle_failed_merge(
        &self,
        commit: &CommitRecord,
        output: &str,
        exit_code: i32,
    ) -> MergeError {
        let conflicts = classify(output);
        if conflicts.is_empty() {
            error!(hash = %commit.hash, exit_code, output = %output.trim_end(), "merge failed");
            return MergeError::UnclassifiedMergeFailure {
                commit: commit.hash.clone(),
                exit_code,
            };
        }

        for conflict in &conflicts {
            warn!(path = %conflict.path, kind = %conflict.kind, detail = %conflict.detail, "merge conflict");
        }

        if let Err(e) = self.notify_conflict(commit, &conflicts, exit_code).await {
            return e;
        }
        MergeError::MergeConflict {
            commit: commit.hash.clone(),
            conflicts: conflicts.len(),
            exit_code,
        }
    }

    async fn notify_conflict(
        &self,
        commit: &CommitRecord,
        conflicts: &[ConflictEntry],
        exit_code: i32,
    ) -> Result<(), MergeError> {
        let s = &self.settings;
        let mail = self.compose_notification(commit, conflicts).await?;
        let key = MarkerKey::new(&s.source, &s.target, &commit.hash);

        if self.ledger.has_notified(&key)? {
            match self.ledger.locate(&key) {
                Some(path) => info!(
                    marker = %path.display(),
                    "conflict notification already sent; delete the marker to send it again"
                ),
                None => info!(hash = %commit.hash, "conflict notification already sent"),
            }
            return Ok(());
        }

        if !s.notifications_enabled {
            info!(to = %mail.to, "email notifications disabled; not sending conflict report");
            self.ledger.record_notified(&key, &mail)?;
            return Ok(());
        }

        match self.mailer.send(&mail).await {
            Ok(()) => {
                info!(to = %mail.to, cc = ?mail.cc, "conflict report sent");
                self.ledger.record_notified(&key, &mail)?;
                Ok(())
            }
            Err(NotificationError::InvalidAddress(detail)) => {
                warn!(%detail, "conflict report has no deliverable address; recording it as handled");
                self.ledger.record_notified(&key, &mail)?;
                Ok(())
            }
            Err(e) => match s.on_send_failure {
                SendFailurePolicy::Fatal => {
                    error!(error = %e, "conflict report not delivered");
                    Err(MergeError::NotificationFailed {
                        commit: commit.hash.clone(),
                        exit_code,
                        source: e,
                    })
                }
                SendFailurePolicy::BestEffort => {
                    warn!(error = %e, "conflict report not delivered; will retry on the next run");
                    Ok(())
                }
            },
        }
    }

    async fn compose_notification(
        &self,
        commit: &CommitRecord,
        conflicts: &[ConflictEntry],
    ) -> Result<OutgoingMail, MergeError> {
        let s = &self.settings;
        let mut cc = s.cc.clone();

        if commit.is_bot_authored(&s.bot_email) {
            let resolver =
                OriginalAuthorResolver::new(&self.git, &s.bot_email, s.max_resolution_depth);
            if let Some(email) = resolver.resolve(&commit.message).await? {
                info!(%email, "copying original author on conflict report");
                cc.push(email);
            }
        }

        let report = ConflictReport::compose(&s.report_context(), commit, conflicts);
        Ok(OutgoingMail::new(&s.from, &commit.author_email, cc, report))
    }
}
