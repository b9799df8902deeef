//! merge-branch command-line tool.
//!
//! Merges every commit of a source branch that is missing from a target
//! branch, one commit at a time, pushing after each success. The first
//! conflict is reported to the commit's author and stops the run with the
//! merge's exit status.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mergebranch_core::config::AppConfig;
use mergebranch_core::git::GitClient;
use mergebranch_core::merge_loop::{MergeLoop, MergeSettings};
use mergebranch_core::notify::{FileMarkerLedger, SmtpMailer};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Forward-merge one branch into another, commit by commit.
#[derive(Parser, Debug)]
#[command(
    name = "merge-branch",
    version,
    about = "Merge unmerged commits from a source branch into a target branch"
)]
struct Cli {
    /// URL of the repository; must match the working tree's remote.
    #[arg(long)]
    repo: String,

    /// Branch whose commits are merged.
    #[arg(long)]
    source: String,

    /// Branch that receives the merges.
    #[arg(long)]
    target: String,

    /// Do not send conflict emails (markers are still written).
    #[arg(long = "no-email", alias = "noemail")]
    no_email: bool,

    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Working tree to operate in.
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Log filter directive, overriding the configured level.
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    if let Err(e) = init_tracing(level) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    run(cli, config).await
}

async fn run(cli: Cli, mut config: AppConfig) -> ExitCode {
    apply_overrides(&mut config, &cli);

    let git = GitClient::from_config(&config.git, &cli.work_dir);
    let mailer = Arc::new(SmtpMailer::from_config(&config.notifications));
    let ledger = Arc::new(FileMarkerLedger::new(&config.notifications.marker_dir));
    let settings = MergeSettings::from_config(&config, cli.repo, cli.source, cli.target);

    let merge_loop = MergeLoop::new(git, mailer, ledger, settings);
    match merge_loop.run().await {
        Ok(summary) => {
            info!(
                merged = summary.merged.len(),
                skipped = summary.skipped.len(),
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "merge run stopped");
            ExitCode::from(e.exit_code())
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            AppConfig::load_and_resolve(path).context("failed to load configuration file")
        }
        None => {
            let mut config = AppConfig::default();
            config.resolve_env_vars();
            config.validate().context("invalid default configuration")?;
            Ok(config)
        }
    }
}

/// Command-line switches that take precedence over the config file.
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if cli.no_email {
        config.notifications.enabled = false;
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .with_context(|| format!("invalid log level '{}'", level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec![
            "merge-branch",
            "--repo",
            "git@example.com:team/app.git",
            "--source",
            "release",
            "--target",
            "main",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_required_arguments() {
        let cli = parse(&[]);
        assert_eq!(cli.repo, "git@example.com:team/app.git");
        assert_eq!(cli.source, "release");
        assert_eq!(cli.target, "main");
        assert_eq!(cli.work_dir, PathBuf::from("."));
        assert!(cli.config.is_none());
        assert!(cli.log_level.is_none());

        assert!(Cli::try_parse_from(["merge-branch", "--repo", "x", "--source", "a"]).is_err());
    }

    #[test]
    fn test_email_enabled_without_flag() {
        let cli = parse(&[]);
        assert!(!cli.no_email);

        let mut config = AppConfig::default();
        apply_overrides(&mut config, &cli);
        assert!(config.notifications.enabled);
    }

    #[test]
    fn test_no_email_flag_disables_sending() {
        for flag in ["--no-email", "--noemail"] {
            let cli = parse(&[flag]);
            assert!(cli.no_email);

            let mut config = AppConfig::default();
            apply_overrides(&mut config, &cli);
            assert!(!config.notifications.enabled);
        }
    }

    #[test]
    fn test_absent_flag_keeps_config_choice() {
        let cli = parse(&[]);
        let mut config = AppConfig::default();
        config.notifications.enabled = false;
        apply_overrides(&mut config, &cli);
        assert!(!config.notifications.enabled);
    }

    #[test]
    fn test_optional_arguments() {
        let cli = parse(&[
            "--config",
            "/etc/merge-branch.toml",
            "--work-dir",
            "/srv/checkout",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/merge-branch.toml")));
        assert_eq!(cli.work_dir, PathBuf::from("/srv/checkout"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config.git.remote, "origin");
        assert!(config.notifications.enabled);
    }

    #[test]
    fn test_load_config_missing_file_fails() {
        let err = load_config(Some(Path::new("/nonexistent/merge-branch.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to load configuration file"));
    }
}
