//! Small filesystem helpers: atomic writes and content hashing
//!
//! Writes go through a temp file in the destination directory followed by a
//! rename, so a half-written config file is never observable at its final
//! path.

use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::GantryResult;

/// Write content to a file atomically (temp file + rename)
pub fn atomic_write(path: &Path, content: &[u8]) -> GantryResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Compute the SHA-256 hash of a byte slice
pub fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha256:{:x}", hasher.finalize())
}

/// Compute the SHA-256 hash of a file's content
pub fn hash_file(path: &Path) -> GantryResult<String> {
    let content = std::fs::read(path)?;
    Ok(hash_bytes(&content))
}

/// Whether two files have identical content
///
/// Missing files are never equal to anything.
pub fn files_equal(a: &Path, b: &Path) -> bool {
    if !a.is_file() || !b.is_file() {
        return false;
    }
    match (hash_file(a), hash_file(b)) {
        (Ok(ha), Ok(hb)) => ha == hb,
        _ => false,
    }
}
