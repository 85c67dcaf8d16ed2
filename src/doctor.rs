//! Environment checks for `gantry check`
//!
//! Read-only verification that the host looks deployable: required binaries,
//! the bare repository, the installed hook, and the destination layout.
//! Warnings are states `gantry init` or the first deployment will fix;
//! errors mean a push would fail.

use std::path::Path;

use crate::config::Config;
use crate::git::GitRepo;
use crate::hook::{self, HOOK_SIGNATURE};
use crate::proxy::CommandProxy;
use crate::state::DeployReceipt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

/// One environment check result
#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

impl Check {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
        }
    }
}

/// Full check report
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub checks: Vec<Check>,
}

impl Report {
    pub fn passes(&self) -> usize {
        self.count(CheckStatus::Pass)
    }

    pub fn warnings(&self) -> usize {
        self.count(CheckStatus::Warning)
    }

    pub fn errors(&self) -> usize {
        self.count(CheckStatus::Error)
    }

    pub fn is_success(&self) -> bool {
        self.errors() == 0
    }

    fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }
}

/// Run all environment checks against a configuration
pub fn run_checks(config: &Config) -> Report {
    let mut report = Report::default();

    report.checks.push(if GitRepo::check_available() {
        Check::new("git", CheckStatus::Pass, "git binary found")
    } else {
        Check::new("git", CheckStatus::Error, "git binary not found on PATH")
    });

    report
        .checks
        .push(command_check("validate command", &config.commands.validate));
    report
        .checks
        .push(command_check("reload command", &config.commands.reload));

    let repo = config.repo_path();
    report.checks.push(if repo.join("HEAD").is_file() {
        Check::new(
            "repository",
            CheckStatus::Pass,
            format!("bare repository at {}", repo.display()),
        )
    } else {
        Check::new(
            "repository",
            CheckStatus::Warning,
            format!("no bare repository at {} (run 'gantry init')", repo.display()),
        )
    });

    report.checks.push(hook_check(&repo));
    report.checks.push(work_tree_check(&config.work_tree()));

    let missing: Vec<String> = config
        .sync
        .iter()
        .filter_map(|m| m.dest.parent())
        .filter(|p| !p.as_os_str().is_empty() && !p.is_dir())
        .map(|p| p.display().to_string())
        .collect();
    report.checks.push(if missing.is_empty() {
        Check::new("destinations", CheckStatus::Pass, "destination parents exist")
    } else {
        Check::new(
            "destinations",
            CheckStatus::Warning,
            format!("missing destination parents: {}", missing.join(", ")),
        )
    });

    report.checks.push(receipt_check(&config.work_tree()));

    report
}

fn command_check(name: &str, template: &str) -> Check {
    let program = template.split_whitespace().next().unwrap_or("");
    if CommandProxy::binary_available(template) {
        Check::new(name, CheckStatus::Pass, format!("`{program}` found"))
    } else {
        Check::new(
            name,
            CheckStatus::Error,
            format!("`{program}` not found on PATH"),
        )
    }
}

fn hook_check(repo: &Path) -> Check {
    let path = hook::hook_path(repo);
    if !path.is_file() {
        return Check::new(
            "hook",
            CheckStatus::Warning,
            format!("no post-receive hook at {} (run 'gantry init')", path.display()),
        );
    }

    let content = std::fs::read_to_string(&path).unwrap_or_default();
    if !content.contains(HOOK_SIGNATURE) {
        return Check::new(
            "hook",
            CheckStatus::Warning,
            "existing post-receive hook is not managed by gantry",
        );
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let executable = std::fs::metadata(&path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
        if !executable {
            return Check::new("hook", CheckStatus::Error, "post-receive hook is not executable");
        }
    }

    Check::new("hook", CheckStatus::Pass, "post-receive hook installed")
}

fn work_tree_check(work_tree: &Path) -> Check {
    if work_tree.is_dir() {
        Check::new(
            "work tree",
            CheckStatus::Pass,
            format!("working tree at {}", work_tree.display()),
        )
    } else {
        Check::new(
            "work tree",
            CheckStatus::Warning,
            format!(
                "working tree {} does not exist yet (created on first deployment)",
                work_tree.display()
            ),
        )
    }
}

fn receipt_check(work_tree: &Path) -> Check {
    match DeployReceipt::load(work_tree) {
        Ok(Some(receipt)) => Check::new(
            "last deployment",
            CheckStatus::Pass,
            format!("{} at {}", receipt.revision, receipt.deployed_at),
        ),
        Ok(None) => Check::new(
            "last deployment",
            CheckStatus::Warning,
            "no deployment recorded yet",
        ),
        Err(e) => Check::new(
            "last deployment",
            CheckStatus::Warning,
            format!("unreadable receipt: {e}"),
        ),
    }
}
