//! Execution of the `git` binary.
//!
//! [`CommandRunner`] is the only place merge-branch touches a process. The
//! production [`ProcessRunner`] spawns `git` in the working tree; tests swap
//! in a scripted runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::GitError;

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        let mut text = self.stdout.clone();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// Runs git with the given arguments and captures its output.
///
/// A non-zero exit is *not* an error at this layer: callers decide whether a
/// failure is fatal (most commands) or expected (merges).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput, GitError>;
}

/// Spawns the real `git` binary inside a working tree.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: String,
    work_dir: PathBuf,
    timezone: String,
}

impl ProcessRunner {
    pub fn new(
        binary: impl Into<String>,
        work_dir: impl AsRef<Path>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            work_dir: work_dir.as_ref().to_path_buf(),
            timezone: timezone.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .current_dir(&self.work_dir)
            .env("TZ", &self.timezone)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(cmd = %format!("{} {}", self.binary, args.join(" ")), "executing");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::BinaryNotFound(self.binary.clone())
            } else {
                GitError::IoError(e)
            }
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted stand-in for the git binary.

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{CommandOutput, CommandRunner};
    use crate::errors::GitError;

    type Responder = Box<dyn Fn(&str) -> CommandOutput + Send + Sync>;

    /// Answers each invocation from a closure over the space-joined argument
    /// list and records every call in order.
    pub(crate) struct ScriptedRunner {
        calls: Mutex<Vec<String>>,
        responder: Responder,
    }

    impl ScriptedRunner {
        pub(crate) fn new(
            responder: impl Fn(&str) -> CommandOutput + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                responder: Box::new(responder),
            })
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
            let line = args.join(" ");
            self.calls.lock().unwrap().push(line.clone());
            Ok((self.responder)(&line))
        }
    }

    pub(crate) fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub(crate) fn fail(exit_code: i32, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code: Some(exit_code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output_joins_streams() {
        let output = CommandOutput {
            stdout: "Auto-merging a.txt".into(),
            stderr: "CONFLICT (content): Merge conflict in a.txt\n".into(),
            exit_code: Some(1),
        };
        assert_eq!(
            output.combined(),
            "Auto-merging a.txt\nCONFLICT (content): Merge conflict in a.txt\n"
        );
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new("definitely-not-a-git-binary", dir.path(), "UTC");
        let err = runner.run(&["status"]).await.unwrap_err();
        assert!(matches!(err, GitError::BinaryNotFound(ref b) if b == "definitely-not-a-git-binary"));
    }
}
