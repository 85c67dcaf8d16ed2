//! Deployment receipt
//!
//! After a successful reload, a small TOML record of what is live is written
//! under the working tree's runtime dir. `gantry check` surfaces it so an
//! operator can tell at a glance which revision the proxy is serving.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GantryError, GantryResult};

/// Record of the last successful deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployReceipt {
    pub revision: String,
    pub reference: String,
    pub deployed_at: DateTime<Utc>,
}

/// Receipt location for a working tree
pub fn receipt_path(work_tree: &Path) -> PathBuf {
    work_tree.join(".gantry/last-deploy.toml")
}

impl DeployReceipt {
    pub fn record(revision: &str, reference: &str) -> Self {
        Self {
            revision: revision.to_string(),
            reference: reference.to_string(),
            deployed_at: Utc::now(),
        }
    }

    pub fn save(&self, work_tree: &Path) -> GantryResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GantryError::Io(std::io::Error::other(e.to_string())))?;
        crate::fs::atomic_write(&receipt_path(work_tree), content.as_bytes())
    }

    pub fn load(work_tree: &Path) -> GantryResult<Option<Self>> {
        let path = receipt_path(work_tree);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let receipt = toml::from_str(&content).map_err(|e| GantryError::Config {
            file: path,
            message: e.to_string(),
        })?;
        Ok(Some(receipt))
    }
}
