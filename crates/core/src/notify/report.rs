//! Plain-text conflict report sent to the author of a commit that failed to
//! merge.

use std::fmt::Write as _;

use crate::conflict::{paths_and_details, ConflictEntry};
use crate::models::CommitRecord;

/// Run-wide facts included in every report.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub repo: String,
    pub source: String,
    pub target: String,
    /// CI job URL, when the run happens inside one.
    pub build_url: Option<String>,
    /// Link to the team's documentation of the merge process.
    pub process_doc_url: Option<String>,
}

/// Subject and body of one conflict notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    pub subject: String,
    pub body: String,
}

impl ConflictReport {
    pub fn compose(ctx: &ReportContext, commit: &CommitRecord, conflicts: &[ConflictEntry]) -> Self {
        let subject = format!(
            "Auto Merge {} from {} to branch {} failed in commit {}",
            ctx.repo, ctx.source, ctx.target, commit.hash
        );
        Self {
            subject,
            body: compose_body(ctx, commit, conflicts),
        }
    }
}

fn compose_body(ctx: &ReportContext, commit: &CommitRecord, conflicts: &[ConflictEntry]) -> String {
    let (paths, details) = paths_and_details(conflicts);
    let mut body = String::new();

    body.push_str(
        "The auto merge script encountered conflicts when attempting to merge one of your \
         commits. Please read this email and take action.\n\n",
    );
    if let Some(url) = &ctx.build_url {
        let _ = write!(body, "Build URL: {}.\n\n", url);
    }
    body.push_str(
        "IMPORTANT NOTE: The auto merge is held up until this conflict is resolved. It is \
         also critical to use the commands below to do the merge.\n\n",
    );

    let _ = writeln!(body, "repo: {}", ctx.repo);
    let _ = writeln!(body, "Source branch: {}", ctx.source);
    let _ = writeln!(body, "Target branch: {}", ctx.target);
    let _ = write!(body, "\n\nHash:\t{}\n", commit.hash);
    let _ = writeln!(body, "Author:\t{}", commit.author_name);
    let _ = writeln!(body, "Author Email:\t{}", commit.author_email);
    let _ = writeln!(body, "Committer:\t{}", commit.committer_name);
    let _ = writeln!(body, "Committer Email:\t{}", commit.committer_email);
    let _ = writeln!(body, "Date:\t{}", commit.date);
    let _ = write!(body, "Message:\n\n\t{}\n\n", commit.message);

    match paths.as_slice() {
        [single] => {
            let _ = write!(body, "Conflict found in file: \t{}", single);
        }
        many => {
            let _ = write!(body, "Conflicts found in files:\n\n\t{}", many.join("\n\t"));
        }
    }
    let _ = write!(body, "\n\nConflict details:\n\n\t{}", details.join("\n\t"));

    push_merge_procedure(&mut body, ctx, commit);
    push_skip_procedure(&mut body, ctx, commit);

    if let Some(url) = &ctx.process_doc_url {
        let _ = writeln!(body, "More details on the process here: {}", url);
    }
    body
}

fn push_merge_procedure(body: &mut String, ctx: &ReportContext, commit: &CommitRecord) {
    body.push_str("\n\nPlease resolve the conflicts by running the following commands:\n\n");
    body.push_str("If you are using a PR:\n\n");
    let _ = writeln!(
        body,
        "1. git clone {} (or use your existing up to date repo)",
        ctx.repo
    );
    let _ = writeln!(
        body,
        "2. git checkout -b [personal branch name] origin/{}",
        ctx.target
    );
    let _ = writeln!(body, "3. git merge {}", commit.hash);
    body.push_str("4. git add\n");
    body.push_str("5. git commit\n");
    body.push_str("6. git push origin [personal branch name]:[personal branch name]\n");
    body.push_str("7. Create a Pull Request using personal branch above.\n");
    body.push_str("\t- Creating a PR will also kick off PR builds to verify the merge fix.\n");
    body.push_str("8. Merge PR using \"Create a merge commit\" method. DO NOT SQUASH MERGE\n");
}

fn push_skip_procedure(body: &mut String, ctx: &ReportContext, commit: &CommitRecord) {
    body.push_str("\n\nIf you DO NOT want to merge this commit then run the following commands:\n\n");
    let _ = writeln!(
        body,
        "1. git clone {} (or use your existing up to date repo)",
        ctx.repo
    );
    let _ = writeln!(
        body,
        "2. git checkout -b [personal branch name] origin/{}",
        ctx.target
    );
    let _ = writeln!(
        body,
        "3. git merge --no-ff {} -s ours -m\"SKIPPING merge of {} from branch {}\"",
        commit.hash, commit.hash, ctx.source
    );
    body.push_str("4. git push origin [personal branch name]:[personal branch name]\n");
    body.push_str("5. Create a Pull Request using personal branch above.\n");
    body.push_str("\t- Creating a PR will also kick off PR builds to verify the merge fix.\n");
    body.push_str("6. Merge PR using \"Create a merge commit\" method. DO NOT SQUASH MERGE\n");
    body.push_str("This will make git think the commit was merged, but no code will change.\n\n");
}
