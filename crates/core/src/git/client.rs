//! Typed git porcelain operations used by the merge loop.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::runner::{CommandRunner, ProcessRunner};
use crate::config::GitConfig;
use crate::errors::GitError;
use crate::models::{MergeOutcome, MergeStrategy};

/// High-level git client over a [`CommandRunner`].
#[derive(Clone)]
pub struct GitClient {
    runner: Arc<dyn CommandRunner>,
    remote: String,
}

impl GitClient {
    pub fn new(runner: Arc<dyn CommandRunner>, remote: impl Into<String>) -> Self {
        Self {
            runner,
            remote: remote.into(),
        }
    }

    /// Client that runs the configured git binary inside `work_dir`.
    pub fn from_config(config: &GitConfig, work_dir: &Path) -> Self {
        info!(
            binary = %config.binary,
            work_dir = %work_dir.display(),
            remote = %config.remote,
            "created GitClient"
        );
        let runner = ProcessRunner::new(&config.binary, work_dir, &config.timezone);
        Self::new(Arc::new(runner), &config.remote)
    }

    /// Configured URL of the tracked remote.
    pub async fn remote_url(&self) -> Result<String, GitError> {
        let key = format!("remote.{}.url", self.remote);
        let output = self.run_checked(&["config", "--get", &key]).await?;
        Ok(output.trim_end().to_string())
    }

    pub async fn clean(&self) -> Result<(), GitError> {
        self.run_checked(&["clean", "-q", "-dxf"]).await?;
        Ok(())
    }

    /// Discard index and working-tree changes on the current branch.
    pub async fn reset_hard(&self) -> Result<(), GitError> {
        self.run_checked(&["reset", "-q", "--hard"]).await?;
        Ok(())
    }

    /// Point the current branch at the remote's copy of `branch`.
    #[instrument(skip(self))]
    pub async fn reset_to_remote(&self, branch: &str) -> Result<(), GitError> {
        let upstream = format!("{}/{}", self.remote, branch);
        self.run_checked(&["reset", "--hard", &upstream]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.run_checked(&["checkout", "-q", branch]).await?;
        Ok(())
    }

    pub async fn pull_rebase(&self) -> Result<(), GitError> {
        self.run_checked(&["pull", "-q", "--rebase"]).await?;
        Ok(())
    }

    pub async fn submodule_init(&self) -> Result<(), GitError> {
        self.run_checked(&["submodule", "init"]).await?;
        Ok(())
    }

    /// Refresh submodule remotes and check out their recorded commits.
    pub async fn update_submodules(&self) -> Result<(), GitError> {
        self.run_checked(&["submodule", "foreach", "git", "submodule", "sync"])
            .await?;
        self.run_checked(&["submodule", "update", "--recursive"])
            .await?;
        Ok(())
    }

    /// Raw first-parent log of `source` commits missing from `target`.
    #[instrument(skip(self, format))]
    pub async fn log_unmerged(
        &self,
        target: &str,
        source: &str,
        format: &str,
    ) -> Result<String, GitError> {
        let format_arg = format!("--format={}", format);
        let range = format!("{}..{}", target, source);
        self.run_checked(&["log", "--first-parent", &format_arg, &range])
            .await
    }

    /// Merge a single commit onto the checked-out branch.
    ///
    /// A non-zero exit is returned as [`MergeOutcome::Conflicted`] rather than
    /// as an error so the caller can classify the output.
    #[instrument(skip(self))]
    pub async fn merge(
        &self,
        hash: &str,
        strategy: MergeStrategy,
        source: &str,
    ) -> Result<MergeOutcome, GitError> {
        let message = strategy.commit_message(hash, source);
        let mut args = vec!["merge"];
        if strategy == MergeStrategy::SkipContent {
            args.extend(["-s", "ours"]);
        }
        args.extend(["--no-ff", "-m", message.as_str(), hash]);

        let output = self.runner.run(&args).await?;
        debug!(stdout = %output.stdout, "merge output");
        Ok(match output.exit_code {
            Some(0) => MergeOutcome::Merged,
            Some(exit_code) => MergeOutcome::Conflicted {
                output: output.combined(),
                exit_code,
            },
            None => MergeOutcome::Terminated,
        })
    }

    #[instrument(skip(self))]
    pub async fn push(&self, branch: &str) -> Result<(), GitError> {
        let output = self.run_checked(&["push", &self.remote, branch]).await?;
        if !output.trim().is_empty() {
            debug!(output = %output.trim_end(), "push output");
        }
        Ok(())
    }

    /// Author email of `rev`.
    pub async fn author_email(&self, rev: &str) -> Result<String, GitError> {
        let output = self
            .run_checked(&["show", "--no-patch", "--pretty=%ae", rev])
            .await?;
        Ok(output.trim_end().to_string())
    }

    /// Full raw message of `rev`.
    pub async fn commit_message(&self, rev: &str) -> Result<String, GitError> {
        let output = self
            .run_checked(&["show", "--no-patch", "--pretty=%B", rev])
            .await?;
        Ok(output.trim_end().to_string())
    }

    /// Run a command that must succeed and return its stdout.
    async fn run_checked(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.runner.run(args).await?;
        if !output.success() {
            let exit_code = output.exit_code.unwrap_or(-1);
            warn!(
                command = %args.join(" "),
                exit_code,
                stdout = %output.stdout.trim_end(),
                stderr = %output.stderr.trim_end(),
                "git command returned non-zero status"
            );
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                exit_code,
                stderr: output.stderr.trim_end().to_string(),
            });
        }
        Ok(output.stdout)
    }
}
