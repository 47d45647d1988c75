use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::commands::CommandReport;
use crate::ledger::paths::resolve_paths;
use crate::logging::log;

pub const DEFAULT_MESSAGE: &str = "Auto pipeline update";

fn resolve_git_bin() -> Result<PathBuf> {
    if let Ok(raw) = env::var("PICK3_GIT_BIN")
        && !raw.trim().is_empty()
    {
        return Ok(PathBuf::from(raw.trim()));
    }
    which::which("git").context("git not found on PATH (set PICK3_GIT_BIN)")
}

fn run_git(git: &Path, repo: &Path, args: &[&str]) -> Result<i32> {
    log(format!("RUN: {} {}", git.display(), args.join(" ")));
    let output = Command::new(git)
        .args(args)
        .current_dir(repo)
        .output()
        .with_context(|| format!("failed to run {} {}", git.display(), args.join(" ")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        log(format!("STDOUT:\n{}", stdout.trim_end()));
    }
    if !stderr.trim().is_empty() {
        log(format!("STDERR:\n{}", stderr.trim_end()));
    }
    Ok(output.status.code().unwrap_or(-1))
}

/// Stage, commit, rebase onto the remote and push. A failed commit (nothing to
/// commit) or pull is logged but only the push result decides the outcome.
pub fn run(message: Option<&str>) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let git = resolve_git_bin()?;
    let message = message.unwrap_or(DEFAULT_MESSAGE);
    let mut report = CommandReport::new("publish");
    report.detail(format!("repo={}", paths.repo_dir.display()));

    log("=== publish started ===");
    let steps: [(&str, Vec<&str>); 3] = [
        ("add", vec!["add", "-A"]),
        ("commit", vec!["commit", "-m", message]),
        ("pull", vec!["pull", "--rebase"]),
    ];
    for (name, args) in steps {
        let rc = run_git(&git, &paths.repo_dir, &args)?;
        report.detail(format!("git_{name}_rc={rc}"));
    }

    let push_rc = run_git(&git, &paths.repo_dir, &["push"])?;
    report.detail(format!("git_push_rc={push_rc}"));
    if push_rc == 0 {
        log("git push succeeded.");
    } else {
        log("git push FAILED.");
        report.issue(format!("git push exited with {push_rc}"));
    }
    log("=== publish finished ===");
    Ok(report)
}
