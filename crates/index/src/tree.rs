//! Range-partition trees for numeric keys.
//!
//! A tree is a directory. Terminal folders (leaves) hold `<key>.index` value
//! files and a `c.count` file recording the number of distinct value files.
//! Once a leaf's count exceeds the configured partition size it is split into
//! two children named `+<pivot>` and `-<pivot>`: keys below the pivot live in
//! the `-` branch, all others in the `+` branch. Descending by repeated pivot
//! comparison therefore reaches exactly one leaf for any key.

use bigdecimal::BigDecimal;
use byteorder::{BigEndian, ByteOrder};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strata_core::{Error, Result};
use tracing::info;

use crate::path::INDEX_EXT;

/// Per-folder distinct-value counter file.
pub(crate) const COUNT_FILE: &str = "c.count";

/// Value file for a key inside a leaf folder.
pub fn value_file(leaf: &Path, key: &BigDecimal) -> PathBuf {
    leaf.join(format!("{}.{INDEX_EXT}", key.normalized()))
}

/// Parses `<key>.index` back into its key.
fn parse_value_stem(name: &str) -> Option<BigDecimal> {
    let stem = name.strip_suffix(".index")?;
    BigDecimal::from_str(stem).ok()
}

/// Parses a branch folder name `+<pivot>` / `-<pivot>`.
/// Returns (is_plus, pivot).
fn parse_branch(name: &str) -> Option<(bool, BigDecimal)> {
    if let Some(rest) = name.strip_prefix('+') {
        return Some((true, BigDecimal::from_str(rest).ok()?));
    }
    let rest = name.strip_prefix('-')?;
    Some((false, BigDecimal::from_str(rest).ok()?))
}

/// The two children of a split folder.
#[derive(Debug)]
pub(crate) struct Children {
    pub minus: PathBuf,
    pub plus: PathBuf,
    pub pivot: BigDecimal,
}

/// Returns the folder's children if it has been split. A folder counts as
/// split only when both branches exist with the same pivot; an interrupted
/// split (one branch, or mismatched names) reads as terminal and is repaired
/// by the startup reconciliation pass.
pub(crate) fn children(folder: &Path) -> Result<Option<Children>> {
    if !folder.exists() {
        return Ok(None);
    }
    let mut minus: Option<(BigDecimal, PathBuf)> = None;
    let mut plus: Option<(BigDecimal, PathBuf)> = None;
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some((is_plus, pivot)) = parse_branch(name) {
            if is_plus {
                plus = Some((pivot, entry.path()));
            } else {
                minus = Some((pivot, entry.path()));
            }
        }
    }
    match (minus, plus) {
        (Some((mp, minus)), Some((pp, plus))) if mp == pp => Ok(Some(Children {
            minus,
            plus,
            pivot: mp,
        })),
        _ => Ok(None),
    }
}

/// Descends from `root` to the single leaf responsible for `key`.
pub fn descend(root: &Path, key: &BigDecimal) -> Result<PathBuf> {
    let mut folder = root.to_path_buf();
    if !folder.exists() {
        return Ok(folder);
    }
    loop {
        match children(&folder)? {
            Some(c) => {
                folder = if *key < c.pivot { c.minus } else { c.plus };
            }
            None => return Ok(folder),
        }
    }
}

/// Reads a folder's `c.count`. Missing file reads as zero.
pub fn read_count(folder: &Path) -> Result<u64> {
    match fs::read(folder.join(COUNT_FILE)) {
        Ok(bytes) if bytes.len() == 8 => Ok(BigEndian::read_u64(&bytes)),
        Ok(bytes) => Err(Error::index(
            folder.display().to_string(),
            format!("count file has {} bytes, expected 8", bytes.len()),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Writes a folder's `c.count`, creating the folder if needed.
pub fn write_count(folder: &Path, count: u64) -> Result<()> {
    fs::create_dir_all(folder)?;
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, count);
    fs::write(folder.join(COUNT_FILE), buf)?;
    Ok(())
}

/// Removes a folder's `c.count` if present.
pub fn remove_count(folder: &Path) -> Result<()> {
    match fs::remove_file(folder.join(COUNT_FILE)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Lists the (key, path) pairs of the value files directly inside a folder,
/// sorted ascending by key.
pub(crate) fn value_files(folder: &Path) -> Result<Vec<(BigDecimal, PathBuf)>> {
    let mut files = Vec::new();
    if !folder.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(key) = parse_value_stem(name) {
            files.push((key, entry.path()));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Splits a leaf around `pivot`: creates both branch folders, redistributes
/// every value file by key comparison, writes fresh per-child counts, and
/// removes the parent's count file.
///
/// Not covered by the rollback log; an interruption leaves a state
/// `recovery::reconcile` can finish or discard.
pub fn repartition(leaf: &Path, pivot: &BigDecimal) -> Result<()> {
    let pivot = pivot.normalized();
    let minus = leaf.join(format!("-{pivot}"));
    let plus = leaf.join(format!("+{pivot}"));
    fs::create_dir_all(&minus)?;
    fs::create_dir_all(&plus)?;

    let mut moved_minus = 0u64;
    let mut moved_plus = 0u64;
    for (key, path) in value_files(leaf)? {
        let target = if key < pivot { &minus } else { &plus };
        let file_name = path.file_name().ok_or_else(|| {
            Error::index(path.display().to_string(), "value file has no name")
        })?;
        fs::rename(&path, target.join(file_name))?;
        if key < pivot {
            moved_minus += 1;
        } else {
            moved_plus += 1;
        }
    }
    write_count(&minus, moved_minus)?;
    write_count(&plus, moved_plus)?;
    remove_count(leaf)?;
    info!(
        leaf = %leaf.display(),
        %pivot,
        minus = moved_minus,
        plus = moved_plus,
        "repartitioned index folder"
    );
    Ok(())
}

/// A strict one-sided range over tree keys.
#[derive(Clone, Debug)]
pub enum RangeBound {
    /// Keys strictly greater than the bound.
    Greater(BigDecimal),
    /// Keys strictly less than the bound.
    Less(BigDecimal),
}

impl RangeBound {
    /// Whether a key lies inside the range.
    pub fn matches(&self, key: &BigDecimal) -> bool {
        match self {
            RangeBound::Greater(b) => key > b,
            RangeBound::Less(b) => key < b,
        }
    }
}

/// Collects the value files whose keys satisfy `bound`, in ascending key
/// order, pruning whole branches by pivot comparison. Only the leaf that
/// straddles the boundary has its individual files compared.
pub fn collect_range(root: &Path, bound: &RangeBound) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if root.exists() {
        collect_range_into(root, bound, &mut out)?;
    }
    Ok(out)
}

fn collect_range_into(folder: &Path, bound: &RangeBound, out: &mut Vec<PathBuf>) -> Result<()> {
    match children(folder)? {
        Some(c) => match bound {
            RangeBound::Greater(b) => {
                if c.pivot > *b {
                    // minus branch straddles, plus branch is all above
                    collect_range_into(&c.minus, bound, out)?;
                    collect_all_into(&c.plus, out)?;
                } else {
                    collect_range_into(&c.plus, bound, out)?;
                }
            }
            RangeBound::Less(b) => {
                if c.pivot <= *b {
                    collect_all_into(&c.minus, out)?;
                    if c.pivot < *b {
                        collect_range_into(&c.plus, bound, out)?;
                    }
                } else {
                    collect_range_into(&c.minus, bound, out)?;
                }
            }
        },
        None => {
            for (key, path) in value_files(folder)? {
                if bound.matches(&key) {
                    out.push(path);
                }
            }
        }
    }
    Ok(())
}

/// Collects every value file in the tree, ascending by key.
pub fn collect_all(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if root.exists() {
        collect_all_into(root, &mut out)?;
    }
    Ok(out)
}

fn collect_all_into(folder: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    match children(folder)? {
        Some(c) => {
            collect_all_into(&c.minus, out)?;
            collect_all_into(&c.plus, out)?;
        }
        None => {
            for (_, path) in value_files(folder)? {
                out.push(path);
            }
        }
    }
    Ok(())
}

/// Calendar-year subfolders of a date column directory, ascending.
pub fn year_dirs(column_dir: &Path) -> Result<Vec<(i32, PathBuf)>> {
    let mut years = Vec::new();
    if !column_dir.exists() {
        return Ok(years);
    }
    for entry in fs::read_dir(column_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Ok(year) = name.parse::<i32>() {
            years.push((year, entry.path()));
        }
    }
    years.sort_by_key(|(year, _)| *year);
    Ok(years)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::append_routes;
    use strata_core::Route;
    use tempfile::tempdir;

    fn key(v: i64) -> BigDecimal {
        BigDecimal::from(v)
    }

    fn add_value(root: &Path, v: i64) {
        let leaf = descend(root, &key(v)).unwrap();
        let file = value_file(&leaf, &key(v));
        append_routes(&file, &[Route::new("p0", v.unsigned_abs(), 10).unwrap()]).unwrap();
    }

    fn keys_of(files: &[PathBuf]) -> Vec<i64> {
        files
            .iter()
            .map(|p| {
                parse_value_stem(p.file_name().unwrap().to_str().unwrap())
                    .unwrap()
                    .to_string()
                    .parse::<i64>()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_descend_unsplit_tree_is_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("amount");
        assert_eq!(descend(&root, &key(5)).unwrap(), root);
    }

    #[test]
    fn test_count_round_trip() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("amount");
        assert_eq!(read_count(&folder).unwrap(), 0);
        write_count(&folder, 7).unwrap();
        assert_eq!(read_count(&folder).unwrap(), 7);
        remove_count(&folder).unwrap();
        assert_eq!(read_count(&folder).unwrap(), 0);
    }

    #[test]
    fn test_repartition_redistributes_and_recounts() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("amount");
        for v in [1, 3, 5, 7, 9] {
            add_value(&root, v);
        }
        write_count(&root, 5).unwrap();

        repartition(&root, &key(5)).unwrap();

        let c = children(&root).unwrap().expect("root is split");
        assert_eq!(c.pivot, key(5));
        assert_eq!(read_count(&c.minus).unwrap(), 2); // 1, 3
        assert_eq!(read_count(&c.plus).unwrap(), 3); // 5, 7, 9
        assert_eq!(read_count(&root).unwrap(), 0);

        // descent routes keys to the right branch
        assert_eq!(descend(&root, &key(4)).unwrap(), c.minus);
        assert_eq!(descend(&root, &key(5)).unwrap(), c.plus);
    }

    #[test]
    fn test_collect_range_prunes_correctly() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("amount");
        for v in 0..20 {
            add_value(&root, v);
        }
        repartition(&root, &key(10)).unwrap();
        let c = children(&root).unwrap().unwrap();
        repartition(&c.minus, &key(5)).unwrap();

        let above = collect_range(&root, &RangeBound::Greater(key(7))).unwrap();
        assert_eq!(keys_of(&above), (8..20).collect::<Vec<_>>());

        let below = collect_range(&root, &RangeBound::Less(key(12))).unwrap();
        assert_eq!(keys_of(&below), (0..12).collect::<Vec<_>>());

        // strictness: the bound itself is excluded
        let at_pivot = collect_range(&root, &RangeBound::Greater(key(10))).unwrap();
        assert_eq!(keys_of(&at_pivot), (11..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_collect_all_ascending() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("amount");
        for v in [9, 2, 14, 0, 7] {
            add_value(&root, v);
        }
        repartition(&root, &key(8)).unwrap();
        assert_eq!(keys_of(&collect_all(&root).unwrap()), vec![0, 2, 7, 9, 14]);
    }

    #[test]
    fn test_negative_pivot_branch_names() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("delta");
        for v in [-10, -5, 0, 5] {
            add_value(&root, v);
        }
        repartition(&root, &key(-5)).unwrap();
        let c = children(&root).unwrap().unwrap();
        assert_eq!(c.pivot, key(-5));
        assert_eq!(keys_of(&collect_range(&root, &RangeBound::Less(key(0))).unwrap()), vec![-10, -5]);
    }
}
