//! Reconciler: stage, validate elsewhere, then apply
//!
//! Reconciliation is split in two phases so a bad configuration never
//! reaches the live destination paths:
//!
//! 1. `stage` copies every mapping whose source exists in the working tree
//!    into a staging area laid out like the destinations. Missing sources
//!    are recorded and skipped, never fatal.
//! 2. `apply` (run only after validation passed) pushes the staging area to
//!    the live destinations: file entries are atomic whole-file overwrites,
//!    dir entries are exact mirrors where destination files absent from the
//!    source are deleted so removed sites and certs don't linger.
//!
//! Entries skipped at stage time are not touched at apply time.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use crate::config::{Mapping, MappingKind};
use crate::error::GantryResult;
use crate::fs::{atomic_write, files_equal};

/// A mapping entry that was staged and is ready for activation
#[derive(Debug, Clone)]
pub struct StagedEntry {
    pub mapping: Mapping,
    pub staged_path: PathBuf,
}

/// Outcome of the staging phase
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    pub staged: Vec<StagedEntry>,
    /// Entries whose source was absent from the working tree
    pub skipped: Vec<Mapping>,
}

impl StageReport {
    /// Staged path of the first file-kind entry, if one was staged
    pub fn staged_primary(&self) -> Option<&Path> {
        self.staged
            .iter()
            .find(|e| e.mapping.kind == MappingKind::File)
            .map(|e| e.staged_path.as_path())
    }
}

/// Outcome of the apply phase
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub written: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

/// Stage every mapping with an existing source into `staging_root`
pub fn stage(
    work_tree: &Path,
    mappings: &[Mapping],
    staging_root: &Path,
) -> GantryResult<StageReport> {
    let mut report = StageReport::default();

    for mapping in mappings {
        let source = work_tree.join(&mapping.source);
        let staged = staged_location(staging_root, &mapping.dest);

        let present = match mapping.kind {
            MappingKind::File => source.is_file(),
            MappingKind::Dir => source.is_dir(),
        };
        if !present {
            report.skipped.push(mapping.clone());
            continue;
        }

        match mapping.kind {
            MappingKind::File => {
                if let Some(parent) = staged.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&source, &staged)?;
            }
            MappingKind::Dir => copy_tree(&source, &staged)?,
        }

        report.staged.push(StagedEntry {
            mapping: mapping.clone(),
            staged_path: staged,
        });
    }

    Ok(report)
}

/// Activate staged entries at their live destinations
pub fn apply(staged: &[StagedEntry]) -> GantryResult<ApplyReport> {
    let mut report = ApplyReport::default();

    for entry in staged {
        match entry.mapping.kind {
            MappingKind::File => {
                apply_file(&entry.staged_path, &entry.mapping.dest, &mut report)?
            }
            MappingKind::Dir => mirror_dir(&entry.staged_path, &entry.mapping.dest, &mut report)?,
        }
    }

    Ok(report)
}

/// Planned outcome for one mapping entry, for dry-run preview
#[derive(Debug, Clone)]
pub struct EntryPlan {
    pub mapping: Mapping,
    pub action: PlannedAction,
    /// Destination files an exact mirror would delete
    pub deletions: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Sync,
    SkipMissing,
}

/// Compute what a deployment would do, without staging or writing anything
pub fn preview(work_tree: &Path, mappings: &[Mapping]) -> GantryResult<Vec<EntryPlan>> {
    let mut plans = Vec::new();

    for mapping in mappings {
        let source = work_tree.join(&mapping.source);

        let present = match mapping.kind {
            MappingKind::File => source.is_file(),
            MappingKind::Dir => source.is_dir(),
        };
        if !present {
            plans.push(EntryPlan {
                mapping: mapping.clone(),
                action: PlannedAction::SkipMissing,
                deletions: Vec::new(),
            });
            continue;
        }

        let mut deletions = Vec::new();
        if mapping.kind == MappingKind::Dir && mapping.dest.is_dir() {
            let (src_files, _) = collect_tree(&source)?;
            let (dest_files, _) = collect_tree(&mapping.dest)?;
            for rel in dest_files.difference(&src_files) {
                deletions.push(mapping.dest.join(rel));
            }
        }

        plans.push(EntryPlan {
            mapping: mapping.clone(),
            action: PlannedAction::Sync,
            deletions,
        });
    }

    Ok(plans)
}

/// Where a destination path lands inside the staging area
fn staged_location(staging_root: &Path, dest: &Path) -> PathBuf {
    let mut rel = PathBuf::new();
    for component in dest.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {}
            other => rel.push(other.as_os_str()),
        }
    }
    staging_root.join(rel)
}

fn copy_tree(source: &Path, dest: &Path) -> GantryResult<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn apply_file(staged: &Path, dest: &Path, report: &mut ApplyReport) -> GantryResult<()> {
    if files_equal(staged, dest) {
        report.unchanged.push(dest.to_path_buf());
        return Ok(());
    }
    if dest.is_dir() {
        std::fs::remove_dir_all(dest)?;
    }
    let content = std::fs::read(staged)?;
    atomic_write(dest, &content)?;
    report.written.push(dest.to_path_buf());
    Ok(())
}

fn mirror_dir(staged: &Path, dest: &Path, report: &mut ApplyReport) -> GantryResult<()> {
    std::fs::create_dir_all(dest)?;

    let (src_files, src_dirs) = collect_tree(staged)?;
    let (dest_files, dest_dirs) = collect_tree(dest)?;

    for rel in &src_dirs {
        let target = dest.join(rel);
        if target.exists() && !target.is_dir() {
            std::fs::remove_file(&target)?;
        }
        std::fs::create_dir_all(&target)?;
    }

    for rel in &src_files {
        let from = staged.join(rel);
        let to = dest.join(rel);
        if files_equal(&from, &to) {
            report.unchanged.push(to);
            continue;
        }
        if to.is_dir() {
            std::fs::remove_dir_all(&to)?;
        }
        let content = std::fs::read(&from)?;
        atomic_write(&to, &content)?;
        report.written.push(to);
    }

    for rel in dest_files.difference(&src_files) {
        let target = dest.join(rel);
        if target.exists() {
            std::fs::remove_file(&target)?;
            report.deleted.push(target);
        }
    }

    // Deepest first so nested extraneous dirs vanish before their parents
    let mut extra_dirs: Vec<&PathBuf> = dest_dirs.difference(&src_dirs).collect();
    extra_dirs.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
    for rel in extra_dirs {
        let target = dest.join(rel);
        if target.exists() {
            std::fs::remove_dir_all(&target)?;
            report.deleted.push(target);
        }
    }

    Ok(())
}

/// Relative file and directory paths under `root`
fn collect_tree(root: &Path) -> GantryResult<(BTreeSet<PathBuf>, BTreeSet<PathBuf>)> {
    fn walk(
        root: &Path,
        dir: &Path,
        files: &mut BTreeSet<PathBuf>,
        dirs: &mut BTreeSet<PathBuf>,
    ) -> GantryResult<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let rel = path
                .strip_prefix(root)
                .expect("walked path is under root")
                .to_path_buf();
            if entry.file_type()?.is_dir() {
                dirs.insert(rel);
                walk(root, &path, files, dirs)?;
            } else {
                files.insert(rel);
            }
        }
        Ok(())
    }

    let mut files = BTreeSet::new();
    let mut dirs = BTreeSet::new();
    walk(root, root, &mut files, &mut dirs)?;
    Ok((files, dirs))
}
