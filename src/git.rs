//! Git repository access
//!
//! Gantry drives the `git` binary directly; the bare repository is the push
//! target and the working tree is materialized out of it with a forced
//! checkout. Hook-inherited `GIT_*` variables are stripped so the explicit
//! `--git-dir`/`--work-tree` flags are the only thing that decides where a
//! command operates.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{GantryError, GantryResult};

/// Materializes a revision into the working tree
///
/// Trait seam so the deployment pipeline can run against a mock in tests.
pub trait Materializer {
    /// Resolve a ref name to a commit id
    fn resolve(&self, reference: &str) -> GantryResult<String>;

    /// Force-populate the working tree with exactly the ref's tree,
    /// discarding prior content and stray files
    fn materialize(&self, reference: &str) -> GantryResult<()>;
}

/// A bare repository plus the working tree it deploys into
#[derive(Debug, Clone)]
pub struct GitRepo {
    git_dir: PathBuf,
    work_tree: PathBuf,
}

impl GitRepo {
    pub fn new(git_dir: PathBuf, work_tree: PathBuf) -> Self {
        Self { git_dir, work_tree }
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    /// Check if the git binary is installed and available
    pub fn check_available() -> bool {
        Command::new("git")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Create a bare repository at `path` (idempotent)
    pub fn init_bare(path: &Path) -> GantryResult<()> {
        std::fs::create_dir_all(path)?;
        run_git("init", Command::new("git").arg("init").arg("--bare").arg(path))?;
        Ok(())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("--git-dir")
            .arg(&self.git_dir)
            .arg("--work-tree")
            .arg(&self.work_tree);
        cmd.env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE");
        cmd
    }
}

impl Materializer for GitRepo {
    fn resolve(&self, reference: &str) -> GantryResult<String> {
        let output = run_git(
            "rev-parse",
            self.command().arg("rev-parse").arg("--verify").arg(reference),
        )?;
        Ok(output.trim().to_string())
    }

    fn materialize(&self, reference: &str) -> GantryResult<()> {
        std::fs::create_dir_all(&self.work_tree)?;

        run_git(
            "checkout",
            self.command()
                .arg("checkout")
                .arg("--force")
                .arg(reference)
                .arg("--"),
        )?;

        // Forced checkout alone leaves untracked leftovers from prior
        // revisions behind; clean them so the tree matches the revision.
        // The runtime dir (lock, receipt) is ours, not the revision's.
        run_git(
            "clean",
            self.command()
                .arg("clean")
                .arg("-fdq")
                .arg("-e")
                .arg("/.gantry"),
        )?;

        Ok(())
    }
}

fn run_git(action: &str, cmd: &mut Command) -> GantryResult<String> {
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| GantryError::Git {
            action: action.to_string(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GantryError::Git {
            action: action.to_string(),
            detail: format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
