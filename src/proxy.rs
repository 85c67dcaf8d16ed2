//! Proxy validation and reload
//!
//! The proxy is controlled through two configured command templates: the
//! syntax checker (zero exit = valid) and the graceful reload. Templates are
//! split on whitespace with no shell quoting; a `{conf}` token in the
//! validate template is replaced with the staged primary config path, so the
//! checker inspects what is about to be activated, not what is live.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{GantryError, GantryResult};

/// Capability interface over the reverse proxy's control commands
pub trait ProxyController {
    /// Run the configured syntax checker; `Err(ValidationFailed)` carries
    /// the checker's diagnostic output
    fn validate(&self, conf: Option<&Path>) -> GantryResult<()>;

    /// Signal the proxy to gracefully reload its configuration
    fn reload(&self) -> GantryResult<()>;
}

/// Command-template backed implementation
#[derive(Debug, Clone)]
pub struct CommandProxy {
    validate_cmd: String,
    reload_cmd: String,
}

impl CommandProxy {
    pub fn new(validate_cmd: String, reload_cmd: String) -> Self {
        Self {
            validate_cmd,
            reload_cmd,
        }
    }

    /// Check if the binary named by a command template is on PATH
    pub fn binary_available(template: &str) -> bool {
        let Some(program) = template.split_whitespace().next() else {
            return false;
        };
        binary_on_path(program)
    }
}

impl ProxyController for CommandProxy {
    fn validate(&self, conf: Option<&Path>) -> GantryResult<()> {
        let args = split_template(&self.validate_cmd, conf);
        let (program, rest) = args.split_first().ok_or_else(|| GantryError::CommandFailed {
            command: self.validate_cmd.clone(),
            detail: "empty command template".to_string(),
        })?;

        let output = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| GantryError::CommandFailed {
                command: self.validate_cmd.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
            diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(GantryError::ValidationFailed {
                diagnostics: diagnostics.trim().to_string(),
            });
        }

        Ok(())
    }

    fn reload(&self) -> GantryResult<()> {
        let args = split_template(&self.reload_cmd, None);
        let (program, rest) = args.split_first().ok_or_else(|| GantryError::CommandFailed {
            command: self.reload_cmd.clone(),
            detail: "empty command template".to_string(),
        })?;

        let output = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| GantryError::CommandFailed {
                command: self.reload_cmd.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GantryError::CommandFailed {
                command: self.reload_cmd.clone(),
                detail: format!(
                    "exit {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }

        Ok(())
    }
}

/// Split a command template on whitespace, substituting `{conf}` tokens
///
/// A `{conf}` token with no config path available is dropped.
fn split_template(template: &str, conf: Option<&Path>) -> Vec<String> {
    template
        .split_whitespace()
        .filter_map(|token| {
            if token == "{conf}" {
                conf.map(|p| p.display().to_string())
            } else {
                Some(token.to_string())
            }
        })
        .collect()
}

fn binary_on_path(program: &str) -> bool {
    let program = Path::new(program);
    if program.is_absolute() {
        return program.is_file();
    }
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn split_template_substitutes_conf() {
        let conf = PathBuf::from("/tmp/stage/etc/nginx/nginx.conf");
        let args = split_template("nginx -t -q -c {conf}", Some(&conf));
        assert_eq!(
            args,
            vec!["nginx", "-t", "-q", "-c", "/tmp/stage/etc/nginx/nginx.conf"]
        );
    }

    #[test]
    fn split_template_drops_conf_token_without_path() {
        let args = split_template("nginx -t -c {conf}", None);
        assert_eq!(args, vec!["nginx", "-t", "-c"]);
    }

    #[test]
    fn binary_on_path_finds_sh() {
        #[cfg(unix)]
        assert!(binary_on_path("sh"));
        assert!(!binary_on_path("definitely-not-a-real-binary-xyz"));
    }

    #[test]
    #[cfg(unix)]
    fn validate_success_on_zero_exit() {
        let proxy = CommandProxy::new("true".to_string(), "true".to_string());
        assert!(proxy.validate(None).is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn validate_failure_surfaces_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("checker.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'nginx: [emerg] unexpected end of file' >&2\nexit 1\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let proxy = CommandProxy::new(script.display().to_string(), "true".to_string());
        let err = proxy.validate(None).unwrap_err();
        match err {
            GantryError::ValidationFailed { diagnostics } => {
                assert!(diagnostics.contains("[emerg]"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn reload_failure_is_command_failed() {
        let proxy = CommandProxy::new("true".to_string(), "false".to_string());
        let err = proxy.reload().unwrap_err();
        assert!(matches!(err, GantryError::CommandFailed { .. }));
    }

    #[test]
    fn missing_binary_fails_to_spawn() {
        let proxy = CommandProxy::new(
            "definitely-not-a-real-binary-xyz -t".to_string(),
            "true".to_string(),
        );
        let err = proxy.validate(None).unwrap_err();
        assert!(matches!(err, GantryError::CommandFailed { .. }));
    }
}
