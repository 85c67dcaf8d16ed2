//! Certificate action
//!
//! Certificate management is optional functionality layered on top of
//! deployment: if the pushed revision ships a certificate script, it runs
//! synchronously from the working tree and its exit status is trusted
//! verbatim. The core never interprets what the script does beyond
//! pass/fail. Behind a trait so pipeline tests can substitute a mock.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{GantryError, GantryResult};

/// What happened to the certificate step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertOutcome {
    /// Script was present and exited zero
    Ran,
    /// Script absent from the working tree; deployment continues
    Skipped,
}

/// Capability interface for the certificate deployment step
pub trait CertAction {
    /// Execute the action against a materialized working tree
    fn run(&self, work_tree: &Path) -> GantryResult<CertOutcome>;

    /// Script path (relative to the working tree) for diagnostics
    fn script(&self) -> &Path;
}

/// Runs the repository-supplied script as a child process with inherited
/// environment and output
#[derive(Debug, Clone)]
pub struct ScriptCertAction {
    script: PathBuf,
}

impl ScriptCertAction {
    pub fn new(script: PathBuf) -> Self {
        Self { script }
    }
}

impl CertAction for ScriptCertAction {
    fn run(&self, work_tree: &Path) -> GantryResult<CertOutcome> {
        let path = work_tree.join(&self.script);
        if !path.is_file() {
            return Ok(CertOutcome::Skipped);
        }

        let status = Command::new(&path)
            .current_dir(work_tree)
            .status()
            .map_err(|e| GantryError::CertScriptFailed {
                script: self.script.clone(),
                detail: e.to_string(),
            })?;

        if !status.success() {
            return Err(GantryError::CertScriptFailed {
                script: self.script.clone(),
                detail: format!("exit {}", status.code().unwrap_or(-1)),
            });
        }

        Ok(CertOutcome::Ran)
    }

    fn script(&self) -> &Path {
        &self.script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_script(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    #[test]
    fn absent_script_is_skipped() {
        let dir = tempdir().unwrap();
        let action = ScriptCertAction::new(PathBuf::from("execute_sh/deploy_certificates.sh"));

        let outcome = action.run(dir.path()).unwrap();
        assert_eq!(outcome, CertOutcome::Skipped);
    }

    #[test]
    #[cfg(unix)]
    fn script_runs_from_working_tree() {
        let dir = tempdir().unwrap();
        let script = PathBuf::from("execute_sh/deploy_certificates.sh");
        // Writes a marker relative to its cwd, which must be the work tree
        write_script(&dir.path().join(&script), "pwd > cert-ran.txt");

        let action = ScriptCertAction::new(script);
        let outcome = action.run(dir.path()).unwrap();

        assert_eq!(outcome, CertOutcome::Ran);
        let recorded = std::fs::read_to_string(dir.path().join("cert-ran.txt")).unwrap();
        assert_eq!(
            Path::new(recorded.trim()).canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    #[cfg(unix)]
    fn failing_script_propagates_status() {
        let dir = tempdir().unwrap();
        let script = PathBuf::from("execute_sh/deploy_certificates.sh");
        write_script(&dir.path().join(&script), "exit 3");

        let action = ScriptCertAction::new(script.clone());
        let err = action.run(dir.path()).unwrap_err();

        match err {
            GantryError::CertScriptFailed { script: s, detail } => {
                assert_eq!(s, script);
                assert!(detail.contains('3'), "detail should carry the exit code: {detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
