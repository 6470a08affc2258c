//! Startup reconciliation of interrupted folder splits.
//!
//! Repartitioning moves value files between folders without rollback-log
//! protection. When a surviving log names a folder as possibly mid-split,
//! this pass inspects it and either finishes the move (majority of files
//! already migrated) or discards the partial children (minority moved).
//! Both outcomes are idempotent.

use bigdecimal::BigDecimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strata_core::{Error, Result};
use tracing::{info, warn};

use crate::tree::{self, remove_count, value_files, write_count};

/// Reconciles one possibly-mid-split folder. Safe to call on folders that
/// never started or already completed a split.
pub fn reconcile(folder: &Path) -> Result<()> {
    if !folder.exists() {
        return Ok(());
    }
    let branches = branch_dirs(folder)?;
    if branches.is_empty() {
        return Ok(());
    }

    let pivots_agree = branches.len() == 2 && branches[0].1 == branches[1].1;
    let parent_files = value_files(folder)?;
    let child_files: usize = branches
        .iter()
        .map(|(path, _)| value_files(path).map(|f| f.len()))
        .sum::<Result<usize>>()?;

    if !pivots_agree {
        warn!(folder = %folder.display(), "discarding mismatched split branches");
        return discard(folder, &branches);
    }

    if parent_files.is_empty() {
        // move complete; make the counts and parent state consistent
        for (path, _) in &branches {
            let actual = value_files(path)?.len() as u64;
            write_count(path, actual)?;
        }
        remove_count(folder)?;
        return Ok(());
    }

    if child_files >= parent_files.len() {
        finish(folder, &branches, parent_files)
    } else {
        discard(folder, &branches)
    }
}

/// Branch folders directly under `folder`, as (path, pivot) pairs.
fn branch_dirs(folder: &Path) -> Result<Vec<(PathBuf, BigDecimal)>> {
    let mut branches = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let rest = name
            .strip_prefix('+')
            .or_else(|| name.strip_prefix('-'));
        if let Some(rest) = rest {
            if let Ok(pivot) = BigDecimal::from_str(rest) {
                branches.push((entry.path(), pivot));
            }
        }
    }
    Ok(branches)
}

/// Completes the move: remaining parent files go to the branch their key
/// selects, counts are rewritten from what is actually on disk.
fn finish(
    folder: &Path,
    branches: &[(PathBuf, BigDecimal)],
    parent_files: Vec<(BigDecimal, PathBuf)>,
) -> Result<()> {
    let pivot = &branches[0].1;
    let plus = branches
        .iter()
        .find(|(path, _)| file_name_starts_with(path, '+'))
        .map(|(path, _)| path.clone())
        .ok_or_else(|| Error::index(folder.display().to_string(), "missing + branch"))?;
    let minus = branches
        .iter()
        .find(|(path, _)| file_name_starts_with(path, '-'))
        .map(|(path, _)| path.clone())
        .ok_or_else(|| Error::index(folder.display().to_string(), "missing - branch"))?;

    let moved = parent_files.len();
    for (key, path) in parent_files {
        let target = if key < *pivot { &minus } else { &plus };
        let name = path
            .file_name()
            .ok_or_else(|| Error::index(path.display().to_string(), "value file has no name"))?;
        fs::rename(&path, target.join(name))?;
    }
    for branch in [&minus, &plus] {
        let actual = value_files(branch)?.len() as u64;
        write_count(branch, actual)?;
    }
    remove_count(folder)?;
    info!(folder = %folder.display(), moved, "finished interrupted split");
    Ok(())
}

/// Abandons the split: child files return to the parent, branch folders are
/// deleted, and the parent count reflects what is on disk.
fn discard(folder: &Path, branches: &[(PathBuf, BigDecimal)]) -> Result<()> {
    let mut returned = 0usize;
    for (branch, _) in branches {
        for (_, path) in value_files(branch)? {
            let name = path.file_name().ok_or_else(|| {
                Error::index(path.display().to_string(), "value file has no name")
            })?;
            fs::rename(&path, folder.join(name))?;
            returned += 1;
        }
        fs::remove_dir_all(branch)?;
    }
    let actual = value_files(folder)?.len() as u64;
    write_count(folder, actual)?;
    warn!(folder = %folder.display(), returned, "discarded partial split");
    Ok(())
}

fn file_name_starts_with(path: &Path, c: char) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(c))
}
