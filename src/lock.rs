//! Exclusive deployment lock
//!
//! One advisory file lock scoped to the working tree, held for the full
//! duration of a deployment run. Acquisition is non-blocking: a concurrent
//! trigger is rejected with a clear "deployment in progress" error instead of
//! queueing behind an unknown amount of work.

use std::fs::File;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{GantryError, GantryResult};

/// Held for the lifetime of one deployment run; released on drop
#[derive(Debug)]
pub struct DeployLock {
    file: File,
    path: PathBuf,
}

impl DeployLock {
    /// Try to acquire the lock for a working tree, failing fast if another
    /// deployment holds it
    pub fn acquire(work_tree: &Path) -> GantryResult<Self> {
        let dir = work_tree.join(".gantry");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("deploy.lock");

        let file = File::create(&path)?;
        file.try_lock_exclusive().map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                GantryError::DeployInProgress { lock: path.clone() }
            } else {
                GantryError::Io(e)
            }
        })?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
