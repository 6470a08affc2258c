//! Per-partition free-list of reusable deleted byte ranges.
//!
//! On disk the empties file starts with an 8-byte big-endian logical row
//! count, followed by consecutive 10-byte packed routes of whitespaced
//! slots. In memory routes are bucketed by length with FIFO order inside a
//! bucket; a popped route moves into `used` until the statement's rollback
//! log is durable, so an aborted build can put it back.

use byteorder::ByteOrder;
use hashbrown::HashMap;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use strata_core::{Error, Result, Route, ROUTE_PACKED_LEN};

use crate::fs::{append, file_len, read_u64_at, truncate, write_u64_at};

/// Byte offset where packed routes start (after the row-count header).
const ROUTES_START: u64 = 8;

/// In-memory view of one partition's free-list.
#[derive(Debug, Default)]
pub struct EmptiesPackage {
    /// length -> FIFO queue of reusable slots.
    buckets: HashMap<u32, VecDeque<Route>>,
    /// Slots consumed by the in-flight statement, by length.
    used: HashMap<u32, Vec<Route>>,
}

impl EmptiesPackage {
    /// Loads a partition's free-list. Returns the package and the logical
    /// row count stored in the file header. A missing file is empty with a
    /// zero count.
    pub fn load(path: &Path, partition: &str) -> Result<(Self, u64)> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok((Self::default(), 0))
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.len() < ROUTES_START as usize
            || (bytes.len() - ROUTES_START as usize) % ROUTE_PACKED_LEN != 0
        {
            return Err(Error::index(
                path.display().to_string(),
                format!("malformed empties file of {} bytes", bytes.len()),
            ));
        }
        let size = byteorder::BigEndian::read_u64(&bytes[0..8]);
        let mut package = Self::default();
        for chunk in bytes[ROUTES_START as usize..].chunks_exact(ROUTE_PACKED_LEN) {
            let route = Route::unpack(partition, chunk)?;
            package.push(route);
        }
        Ok((package, size))
    }

    /// Adds a reusable slot to its length bucket.
    pub fn push(&mut self, route: Route) {
        self.buckets
            .entry(route.length())
            .or_default()
            .push_back(route);
    }

    /// Pops at most one slot of exactly `length`, FIFO, remembering it under
    /// `used` until the statement settles.
    pub fn pop_empty(&mut self, length: u32) -> Option<Route> {
        let bucket = self.buckets.get_mut(&length)?;
        let route = bucket.pop_front()?;
        if bucket.is_empty() {
            self.buckets.remove(&length);
        }
        self.used.entry(length).or_default().push(route.clone());
        Some(route)
    }

    /// Returns consumed slots to their buckets; used when a statement
    /// aborts before its rollback log was written.
    pub fn restore_used(&mut self) {
        let used = std::mem::take(&mut self.used);
        for (_, routes) in used {
            for route in routes {
                // front, not back: the slot keeps its FIFO seniority
                self.buckets
                    .entry(route.length())
                    .or_default()
                    .push_front(route);
            }
        }
    }

    /// Slots consumed so far by the in-flight statement, without settling.
    pub fn used_routes(&self) -> Vec<Route> {
        self.used.values().flatten().cloned().collect()
    }

    /// Drops the `used` record once the statement's log is durable.
    pub fn settle_used(&mut self) -> Vec<Route> {
        let mut consumed = Vec::new();
        for (_, routes) in std::mem::take(&mut self.used) {
            consumed.extend(routes);
        }
        consumed
    }

    /// Number of reusable slots across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(VecDeque::len).sum()
    }

    /// Returns true if there are no reusable slots.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// All reusable slots, unordered across buckets.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.buckets.values().flatten()
    }
}

/// Creates an empties file with a zero row count.
pub fn create_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, 0u64.to_be_bytes())?;
    Ok(())
}

/// Reads the logical row count from the file header.
pub fn read_size(path: &Path) -> Result<u64> {
    read_u64_at(path, 0)
}

/// Writes the logical row count into the file header.
pub fn write_size(path: &Path, size: u64) -> Result<()> {
    write_u64_at(path, 0, size)
}

/// Appends a packed route to the file.
pub fn append_route(path: &Path, route: &Route) -> Result<()> {
    append(path, &route.pack())?;
    Ok(())
}

/// Removes one packed route by swapping the tail route into its place and
/// truncating, leaving the header untouched. Returns whether it was found.
pub fn remove_route(path: &Path, route: &Route) -> Result<bool> {
    let len = file_len(path)?;
    if len < ROUTES_START {
        return Ok(false);
    }
    let bytes = fs::read(path)?;
    let target = route.pack();
    let region = &bytes[ROUTES_START as usize..];
    let Some(idx) = region
        .chunks_exact(ROUTE_PACKED_LEN)
        .position(|chunk| chunk == target)
    else {
        return Ok(false);
    };
    let pos = ROUTES_START + (idx * ROUTE_PACKED_LEN) as u64;
    let tail_off = len - ROUTE_PACKED_LEN as u64;
    if pos != tail_off {
        let tail = &bytes[tail_off as usize..];
        crate::fs::write_at(path, pos, tail)?;
    }
    truncate(path, tail_off)?;
    Ok(true)
}

/// Current byte length of the empties file.
pub fn length(path: &Path) -> Result<u64> {
    file_len(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn route(offset: u64, length: u32) -> Route {
        Route::new("p0", offset, length).unwrap()
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let (package, size) = EmptiesPackage::load(&dir.path().join("e"), "p0").unwrap();
        assert!(package.is_empty());
        assert_eq!(size, 0);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e");
        create_file(&path).unwrap();
        write_size(&path, 42).unwrap();
        append_route(&path, &route(100, 20)).unwrap();
        append_route(&path, &route(200, 20)).unwrap();
        append_route(&path, &route(300, 35)).unwrap();

        let (mut package, size) = EmptiesPackage::load(&path, "p0").unwrap();
        assert_eq!(size, 42);
        assert_eq!(package.len(), 3);

        // FIFO within the length-20 bucket
        assert_eq!(package.pop_empty(20), Some(route(100, 20)));
        assert_eq!(package.pop_empty(20), Some(route(200, 20)));
        assert_eq!(package.pop_empty(20), None);
        assert_eq!(package.pop_empty(99), None);
    }

    #[test]
    fn test_pop_moves_to_used_and_restores() {
        let mut package = EmptiesPackage::default();
        package.push(route(10, 8));
        package.push(route(50, 8));

        let popped = package.pop_empty(8).unwrap();
        assert_eq!(popped, route(10, 8));
        assert_eq!(package.len(), 1);

        package.restore_used();
        assert_eq!(package.len(), 2);
        // seniority preserved: the restored slot pops first again
        assert_eq!(package.pop_empty(8), Some(route(10, 8)));
    }

    #[test]
    fn test_settle_used_reports_consumed() {
        let mut package = EmptiesPackage::default();
        package.push(route(10, 8));
        package.pop_empty(8).unwrap();
        let consumed = package.settle_used();
        assert_eq!(consumed, vec![route(10, 8)]);
        package.restore_used();
        assert_eq!(package.len(), 0);
    }

    #[test]
    fn test_remove_route_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e");
        create_file(&path).unwrap();
        for r in [route(1, 10), route(2, 10), route(3, 10)] {
            append_route(&path, &r).unwrap();
        }

        assert!(remove_route(&path, &route(1, 10)).unwrap());
        assert!(!remove_route(&path, &route(1, 10)).unwrap());

        let (package, _) = EmptiesPackage::load(&path, "p0").unwrap();
        let mut offsets: Vec<u64> = package.routes().map(Route::offset).collect();
        offsets.sort_unstable();
        assert_eq!(offsets, vec![2, 3]);
    }

    #[test]
    fn test_malformed_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e");
        std::fs::write(&path, [0u8; 13]).unwrap();
        assert!(EmptiesPackage::load(&path, "p0").is_err());
    }
}
