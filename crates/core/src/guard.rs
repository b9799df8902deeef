//! Repository guard.
//!
//! Before any merge work the working tree must be the expected repository and
//! both branches must match the remote exactly. Local state is thrown away.

use tracing::{error, info};

use crate::errors::MergeError;
use crate::git::GitClient;

/// Fail with [`MergeError::IdentityMismatch`] unless the tracked remote's URL
/// is `expected_repo`.
pub async fn verify_identity(git: &GitClient, expected_repo: &str) -> Result<(), MergeError> {
    let actual = git.remote_url().await?;
    if actual != expected_repo {
        error!(
            expected = expected_repo,
            actual = %actual,
            "repository does not match the requested repo"
        );
        return Err(MergeError::IdentityMismatch {
            expected: expected_repo.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Verify the repository and reset both branches to the remote.
///
/// Leaves `target` checked out with submodules initialised and updated.
pub async fn verify_and_sync(
    git: &GitClient,
    expected_repo: &str,
    source: &str,
    target: &str,
) -> Result<(), MergeError> {
    verify_identity(git, expected_repo).await?;

    for branch in [source, target] {
        info!(branch, "resetting branch to remote");
        git.clean().await?;
        git.reset_hard().await?;
        git.checkout(branch).await?;
        git.reset_to_remote(branch).await?;
    }

    git.submodule_init().await?;
    git.pull_rebase().await?;
    git.update_submodules().await?;
    info!(source, target, "working tree synchronised");
    Ok(())
}
