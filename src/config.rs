//! Configuration loading
//!
//! Gantry reads a TOML config file (default `/etc/gantry.toml`). Every field
//! has a default; the defaults reproduce the conventional deployment layout:
//! bare repository at `/home/git/<project>.git`, working tree at
//! `/srv/<project>-deploy`, nginx configuration under `/etc/nginx`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GantryError, GantryResult};

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gantry.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project name, used to derive default repo and working tree paths
    pub project: String,
    pub paths: PathsConfig,
    pub deploy: DeployConfig,
    pub commands: CommandsConfig,
    pub certificates: CertificatesConfig,
    /// Path mapping table, reconciled in order (primary config file first)
    pub sync: Vec<Mapping>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: "site".to_string(),
            paths: PathsConfig::default(),
            deploy: DeployConfig::default(),
            commands: CommandsConfig::default(),
            certificates: CertificatesConfig::default(),
            sync: default_mappings(),
        }
    }
}

/// Repository and working tree locations
///
/// Both are optional; unset values are derived from the project name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub repo: Option<PathBuf>,
    pub work_tree: Option<PathBuf>,
}

/// Which ref a push must update to trigger deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    #[serde(rename = "ref")]
    pub reference: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            reference: "refs/heads/main".to_string(),
        }
    }
}

/// External command templates
///
/// Commands are split on whitespace; no shell quoting is performed. The
/// `{conf}` token in the validate template is replaced with the path of the
/// staged primary configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub validate: String,
    pub reload: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            validate: "nginx -t -q -c {conf}".to_string(),
            reload: "systemctl reload nginx".to_string(),
        }
    }
}

/// Optional certificate deployment script, relative to the working tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificatesConfig {
    pub script: PathBuf,
}

impl Default for CertificatesConfig {
    fn default() -> Self {
        Self {
            script: PathBuf::from("execute_sh/deploy_certificates.sh"),
        }
    }
}

/// One entry of the path mapping table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    /// Source path, relative to the working tree
    pub source: PathBuf,
    /// Destination path, absolute
    pub dest: PathBuf,
    pub kind: MappingKind,
}

/// File entries are whole-file overwrites; dir entries are exact mirrors
/// (extraneous destination files are deleted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingKind {
    File,
    Dir,
}

/// The fixed default mapping table
pub fn default_mappings() -> Vec<Mapping> {
    vec![
        Mapping {
            source: PathBuf::from("nginx_conf/nginx.conf"),
            dest: PathBuf::from("/etc/nginx/nginx.conf"),
            kind: MappingKind::File,
        },
        Mapping {
            source: PathBuf::from("nginx_conf/conf.d"),
            dest: PathBuf::from("/etc/nginx/conf.d"),
            kind: MappingKind::Dir,
        },
        Mapping {
            source: PathBuf::from("nginx_conf/sites"),
            dest: PathBuf::from("/etc/nginx/sites"),
            kind: MappingKind::Dir,
        },
    ]
}

/// Non-fatal configuration warning surfaced to CLI users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> GantryResult<Self> {
        Ok(Self::load_with_warnings(path)?.0)
    }

    /// Load configuration and collect non-fatal warnings (e.g. unknown keys)
    pub fn load_with_warnings(path: &Path) -> GantryResult<(Self, Vec<ConfigWarning>)> {
        let content = fs::read_to_string(path)?;

        let mut unknown_paths: Vec<String> = Vec::new();
        let deserializer = toml::de::Deserializer::new(&content);

        let config: Config = serde_ignored::deserialize(deserializer, |p| {
            unknown_paths.push(p.to_string());
        })
        .map_err(|e| GantryError::Config {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let warnings = unknown_paths
            .into_iter()
            .map(|key| ConfigWarning {
                key,
                file: path.to_path_buf(),
            })
            .collect();

        Ok((config, warnings))
    }

    /// Load from an explicit path, `GANTRY_CONFIG`, `/etc/gantry.toml`, or
    /// defaults, in that order; environment overrides are applied last.
    ///
    /// An explicit path that fails to load is an error; the fallback
    /// locations are only consulted when they exist.
    pub fn load_or_default(explicit: Option<&Path>) -> GantryResult<Self> {
        let config = if let Some(path) = explicit {
            Self::load(path)?
        } else if let Ok(env_path) = std::env::var("GANTRY_CONFIG") {
            Self::load(Path::new(&env_path))?
        } else {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                Self::load(default_path)?
            } else {
                Self::default()
            }
        };
        Ok(with_env_overrides(config))
    }

    /// Bare repository path (derived from the project name when unset)
    pub fn repo_path(&self) -> PathBuf {
        self.paths
            .repo
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/home/git/{}.git", self.project)))
    }

    /// Working tree path (derived from the project name when unset)
    pub fn work_tree(&self) -> PathBuf {
        self.paths
            .work_tree
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/srv/{}-deploy", self.project)))
    }

    /// Installed hook location inside the bare repository
    pub fn hook_path(&self) -> PathBuf {
        self.repo_path().join("hooks/post-receive")
    }

    /// The primary configuration file entry: the first file-kind mapping
    pub fn primary_conf(&self) -> Option<&Mapping> {
        self.sync.iter().find(|m| m.kind == MappingKind::File)
    }
}

/// Apply environment variable overrides (`GANTRY_*` prefix)
pub fn with_env_overrides(config: Config) -> Config {
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

fn apply_env_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(project) = lookup("GANTRY_PROJECT") {
        config.project = project;
    }
    if let Some(repo) = lookup("GANTRY_REPO") {
        config.paths.repo = Some(PathBuf::from(repo));
    }
    if let Some(work_tree) = lookup("GANTRY_WORK_TREE") {
        config.paths.work_tree = Some(PathBuf::from(work_tree));
    }
    if let Some(reference) = lookup("GANTRY_DEPLOY_REF") {
        config.deploy.reference = reference;
    }
    config
}
