//! Post-receive hook plumbing
//!
//! git feeds the hook one line per updated ref on stdin: `<old> <new> <ref>`.
//! Gantry deploys only when the configured deploy ref was updated; pushes to
//! other branches or tags, and deletions of the deploy ref, are deliberate
//! no-ops so multi-ref pushes stay deterministic.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::error::{GantryError, GantryResult};

/// Signature line written into installed hook scripts, used to recognize
/// our own hook on reinstall
pub const HOOK_SIGNATURE: &str = "# gantry post-receive hook";

/// One ref update reported by the post-receive hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub old: String,
    pub new: String,
    pub name: String,
}

impl RefUpdate {
    /// A deletion pushes an all-zero new id
    pub fn is_delete(&self) -> bool {
        !self.new.is_empty() && self.new.chars().all(|c| c == '0')
    }

    /// A creation pushes an all-zero old id
    pub fn is_create(&self) -> bool {
        !self.old.is_empty() && self.old.chars().all(|c| c == '0')
    }
}

/// Parse post-receive stdin lines into ref updates
///
/// Blank lines are ignored; anything else that is not exactly three
/// whitespace-separated fields is an error.
pub fn parse_ref_updates<R: BufRead>(reader: R) -> GantryResult<Vec<RefUpdate>> {
    let mut updates = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(old), Some(new), Some(name), None) => updates.push(RefUpdate {
                old: old.to_string(),
                new: new.to_string(),
                name: name.to_string(),
            }),
            _ => {
                return Err(GantryError::BadRefLine {
                    line: trimmed.to_string(),
                })
            }
        }
    }

    Ok(updates)
}

/// Whether any update moves the deploy ref to a new (non-deleted) tip
pub fn selects_deploy(updates: &[RefUpdate], deploy_ref: &str) -> bool {
    updates
        .iter()
        .any(|u| u.name == deploy_ref && !u.is_delete())
}

/// Result of a hook installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    Replaced,
}

/// Install the post-receive hook into a bare repository
///
/// `exe` is the gantry binary the hook should exec. An existing hook is only
/// replaced when it carries our signature or `force` is set.
pub fn install_hook(repo: &Path, exe: &Path, force: bool) -> GantryResult<InstallOutcome> {
    let hooks_dir = repo.join("hooks");
    std::fs::create_dir_all(&hooks_dir)?;
    let hook_path = hooks_dir.join("post-receive");

    let existing = hook_path.exists();
    if existing && !force {
        let content = std::fs::read_to_string(&hook_path).unwrap_or_default();
        if !content.contains(HOOK_SIGNATURE) {
            return Err(GantryError::HookExists { path: hook_path });
        }
    }

    let script = format!(
        "#!/bin/sh\n{}\nexec \"{}\" run\n",
        HOOK_SIGNATURE,
        exe.display()
    );
    crate::fs::atomic_write(&hook_path, script.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&hook_path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(if existing {
        InstallOutcome::Replaced
    } else {
        InstallOutcome::Installed
    })
}

/// Installed hook path for a repository
pub fn hook_path(repo: &Path) -> PathBuf {
    repo.join("hooks/post-receive")
}
