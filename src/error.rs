//! Error types for Gantry
//!
//! Uses `thiserror` for library errors; binaries wrap with `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Gantry operations
pub type GantryResult<T> = Result<T, GantryError>;

/// Main error type for Gantry operations
#[derive(Error, Debug)]
pub enum GantryError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration file
    #[error("invalid config {file}: {message}")]
    Config { file: PathBuf, message: String },

    /// A git invocation failed
    #[error("git {action} failed: {detail}")]
    Git { action: String, detail: String },

    /// An external command failed (reload, misc. tooling)
    #[error("command `{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },

    /// The proxy's syntax checker rejected the staged configuration
    #[error("configuration validation failed:\n{diagnostics}")]
    ValidationFailed { diagnostics: String },

    /// The repository-supplied certificate script exited non-zero
    #[error("certificate script {script} failed: {detail}")]
    CertScriptFailed { script: PathBuf, detail: String },

    /// Another deployment holds the lock
    #[error("deployment already in progress (lock held at {lock})")]
    DeployInProgress { lock: PathBuf },

    /// A post-receive stdin line did not parse as `<old> <new> <ref>`
    #[error("malformed ref update line: '{line}'")]
    BadRefLine { line: String },

    /// An unrecognized hook already exists at the install path
    #[error("refusing to overwrite existing post-receive hook at {path} (use --force)")]
    HookExists { path: PathBuf },
}
