//! TOML-based configuration for merge-branch.
//!
//! Every section is optional: a run with no config file uses the defaults
//! below. Values that come from the environment are named by `_env` fields
//! and resolved at runtime via [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Git invocation settings.
    #[serde(default)]
    pub git: GitConfig,

    /// The automation's own commit identity.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Conflict notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

/// How the `git` binary is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Path or name of the git executable.
    #[serde(default = "default_git_binary")]
    pub binary: String,

    /// Remote holding the canonical source and target branches.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// `TZ` value exported to every git child process.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_git_binary() -> String {
    "git".into()
}
fn default_remote() -> String {
    "origin".into()
}
fn default_timezone() -> String {
    "America/Los_Angeles".into()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            remote: default_remote(),
            timezone: default_timezone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The identity the automation commits as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Display name used as the notification sender.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Author/committer email of merge commits created by this tool.
    #[serde(default = "default_bot_email")]
    pub bot_email: String,

    /// Longest chain of scripted merges followed when looking for a human
    /// author.
    #[serde(default = "default_max_resolution_depth")]
    pub max_resolution_depth: usize,
}

fn default_bot_name() -> String {
    "Merge Bot".into()
}
fn default_bot_email() -> String {
    "merge-bot@example.com".into()
}
fn default_max_resolution_depth() -> usize {
    32
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            bot_email: default_bot_email(),
            max_resolution_depth: default_max_resolution_depth(),
        }
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// What to do when a conflict notification cannot be delivered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SendFailurePolicy {
    /// Halt the run with a notification error; no marker is written.
    #[default]
    Fatal,
    /// Log the failure and halt with the merge's own exit status; no marker
    /// is written so the next run tries again.
    BestEffort,
}

/// Conflict notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Master switch; the `--no-email` flag turns this off for one run.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SMTP relay host.
    #[serde(default = "default_smtp_relay")]
    pub smtp_relay: String,

    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Upgrade the relay connection with STARTTLS.
    #[serde(default)]
    pub starttls: bool,

    /// Sender address; defaults to the bot identity.
    #[serde(default)]
    pub from: Option<String>,

    /// Distribution list copied on every conflict report.
    #[serde(default = "default_cc")]
    pub cc: Vec<String>,

    /// Directory holding the sent-notification markers.
    #[serde(default = "default_marker_dir")]
    pub marker_dir: PathBuf,

    /// Environment variable holding the CI build URL.
    #[serde(default = "default_build_url_env")]
    pub build_url_env: String,

    /// Link to the team's merge process documentation, appended to reports.
    #[serde(default)]
    pub process_doc_url: Option<String>,

    /// Policy for failed deliveries.
    #[serde(default)]
    pub on_send_failure: SendFailurePolicy,

    /// Resolved build URL (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub build_url: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_smtp_relay() -> String {
    "localhost".into()
}
fn default_smtp_port() -> u16 {
    25
}
fn default_cc() -> Vec<String> {
    vec!["merge-conflicts@example.com".into()]
}
fn default_marker_dir() -> PathBuf {
    std::env::temp_dir()
}
fn default_build_url_env() -> String {
    "BUILD_URL".into()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smtp_relay: default_smtp_relay(),
            smtp_port: default_smtp_port(),
            starttls: false,
            from: None,
            cc: default_cc(),
            marker_dir: default_marker_dir(),
            build_url_env: default_build_url_env(),
            process_doc_url: None,
            on_send_failure: SendFailurePolicy::default(),
            build_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `_env` references. A missing variable is not an error: the
    /// build URL is simply left out of notifications.
    pub fn resolve_env_vars(&mut self) {
        self.notifications.build_url = resolve_optional_env(
            &self.notifications.build_url_env,
            "notifications.build_url_env",
        );
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.git.binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "git.binary".into(),
                detail: "git binary must not be empty".into(),
            });
        }
        if self.git.remote.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "git.remote".into(),
                detail: "remote name must not be empty".into(),
            });
        }
        if !self.identity.bot_email.contains('@') {
            return Err(ConfigError::InvalidValue {
                field: "identity.bot_email".into(),
                detail: format!("'{}' is not an email address", self.identity.bot_email),
            });
        }
        if self.identity.max_resolution_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "identity.max_resolution_depth".into(),
                detail: "depth must be > 0".into(),
            });
        }
        if self.notifications.enabled && self.notifications.smtp_relay.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "notifications.smtp_relay".into(),
                detail: "an SMTP relay is required while notifications are enabled".into(),
            });
        }
        if let Err(e) = self.sender().parse::<Mailbox>() {
            return Err(ConfigError::InvalidValue {
                field: "notifications.from".into(),
                detail: format!("'{}' is not a valid sender mailbox: {}", self.sender(), e),
            });
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Sender mailbox for notifications: the configured `from`, otherwise the
    /// bot identity.
    pub fn sender(&self) -> String {
        match &self.notifications.from {
            Some(from) => from.clone(),
            None => format!("{} <{}>", self.identity.bot_name, self.identity.bot_email),
        }
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` when it
/// is set and non-empty.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            debug!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[git]
binary = "/usr/bin/git"
remote = "upstream"
timezone = "UTC"

[identity]
bot_name = "Auto Merger"
bot_email = "automerge@example.com"
max_resolution_depth = 8

[notifications]
enabled = true
smtp_relay = "relay.example.com"
smtp_port = 587
starttls = true
cc = ["frameworks@example.com", "leads@example.com"]
marker_dir = "/var/tmp/merge-branch"
build_url_env = "CI_JOB_URL"
process_doc_url = "https://wiki.example.com/automerge"
on_send_failure = "best_effort"

[log]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.git.remote, "upstream");
        assert_eq!(config.identity.bot_email, "automerge@example.com");
        assert_eq!(config.identity.max_resolution_depth, 8);
        assert_eq!(config.notifications.smtp_port, 587);
        assert!(config.notifications.starttls);
        assert_eq!(config.notifications.cc.len(), 2);
        assert_eq!(
            config.notifications.on_send_failure,
            SendFailurePolicy::BestEffort
        );
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge-branch.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.git.timezone, "UTC");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/merge-branch.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.git.binary, "git");
        assert_eq!(config.git.remote, "origin");
        assert_eq!(config.git.timezone, "America/Los_Angeles");
        assert_eq!(config.identity.max_resolution_depth, 32);
        assert!(config.notifications.enabled);
        assert_eq!(config.notifications.smtp_port, 25);
        assert_eq!(config.notifications.build_url_env, "BUILD_URL");
        assert_eq!(config.notifications.on_send_failure, SendFailurePolicy::Fatal);
        assert_eq!(config.sender(), "Merge Bot <merge-bot@example.com>");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_bot_email() {
        let mut config = AppConfig::default();
        config.identity.bot_email = "merge-bot".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "identity.bot_email"
        ));
    }

    #[test]
    fn test_validate_rejects_unparseable_sender() {
        let mut config = AppConfig::default();
        config.notifications.from = Some("merge bot at example dot com".into());
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "notifications.from"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let mut config = AppConfig::default();
        config.identity.max_resolution_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_MERGE_BRANCH_BUILD_URL", "https://ci.example.com/job/42");

        let mut config: AppConfig = toml::from_str(
            r#"
[notifications]
build_url_env = "TEST_MERGE_BRANCH_BUILD_URL"
"#,
        )
        .unwrap();
        config.resolve_env_vars();
        assert_eq!(
            config.notifications.build_url.as_deref(),
            Some("https://ci.example.com/job/42")
        );

        std::env::remove_var("TEST_MERGE_BRANCH_BUILD_URL");
    }

    #[test]
    fn test_missing_env_var_leaves_build_url_unset() {
        let mut config: AppConfig = toml::from_str(
            r#"
[notifications]
build_url_env = "TEST_MERGE_BRANCH_UNSET_VAR"
"#,
        )
        .unwrap();
        config.resolve_env_vars();
        assert!(config.notifications.build_url.is_none());
    }
}
