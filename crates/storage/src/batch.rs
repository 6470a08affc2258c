//! The `Batch`: every delta a single statement will apply.
//!
//! A batch is built in memory, serialized to the rollback log before any
//! file is touched, applied, and then kept on disk until the next statement
//! replaces the log. Deterministic iteration order matters for the log
//! format, so path-keyed maps are `BTreeMap`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use strata_core::Route;

/// A row write: where it goes and the exact line bytes, newline included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowWrite {
    pub route: Route,
    pub line: String,
}

/// All deltas of one Insert, Delete, or composed Update statement against
/// one partition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    pub partition: String,
    /// Rows this statement writes (`Rw`).
    pub row_writes: Vec<RowWrite>,
    /// Pre-images of rows this statement deletes (`Ro`).
    pub deleted_rows: Vec<RowWrite>,
    /// Routes newly appended per index file (`I`).
    pub index_writes: BTreeMap<PathBuf, Vec<Route>>,
    /// Routes removed per index file (`ID`).
    pub invalidated: BTreeMap<PathBuf, Vec<Route>>,
    /// Free-list slots this statement consumes (`E`).
    pub consumed_empties: Vec<Route>,
    /// Logical row count before the statement (`TS`).
    pub old_size: Option<u64>,
    /// Empties file byte length before the statement (`ES`).
    pub old_empties_len: Option<u64>,
    /// Count-file values before the statement (`C`).
    pub old_counts: BTreeMap<PathBuf, u64>,
    /// Folders this statement split (`N`); never rolled back, only
    /// reconciled at startup.
    pub repartitioned: Vec<PathBuf>,
}

impl Batch {
    /// Creates an empty batch for a partition.
    pub fn new(partition: impl Into<String>) -> Self {
        Batch {
            partition: partition.into(),
            ..Batch::default()
        }
    }

    /// Records an inserted row.
    pub fn add_row_write(&mut self, route: Route, line: String) {
        self.row_writes.push(RowWrite { route, line });
    }

    /// Records a deleted row's pre-image.
    pub fn add_deleted_row(&mut self, route: Route, line: String) {
        self.deleted_rows.push(RowWrite { route, line });
    }

    /// Records a route to be appended to an index file.
    pub fn add_index_write(&mut self, path: PathBuf, route: Route) {
        self.index_writes.entry(path).or_default().push(route);
    }

    /// Records a route to be removed from an index file.
    pub fn add_invalidated(&mut self, path: PathBuf, route: Route) {
        self.invalidated.entry(path).or_default().push(route);
    }

    /// Records a count file's pre-statement value, keeping the first
    /// recording when the same folder is touched twice.
    pub fn record_old_count(&mut self, folder: PathBuf, old: u64) {
        self.old_counts.entry(folder).or_insert(old);
    }

    /// Returns true if the statement changes nothing.
    pub fn is_empty(&self) -> bool {
        self.row_writes.is_empty()
            && self.deleted_rows.is_empty()
            && self.index_writes.is_empty()
            && self.invalidated.is_empty()
    }

    /// Merges another batch for the same partition into this one, the way
    /// Update folds its Delete and Insert halves into a single statement.
    pub fn merge(&mut self, other: Batch) {
        debug_assert_eq!(self.partition, other.partition);
        self.row_writes.extend(other.row_writes);
        self.deleted_rows.extend(other.deleted_rows);
        for (path, routes) in other.index_writes {
            self.index_writes.entry(path).or_default().extend(routes);
        }
        for (path, routes) in other.invalidated {
            self.invalidated.entry(path).or_default().extend(routes);
        }
        self.consumed_empties.extend(other.consumed_empties);
        if self.old_size.is_none() {
            self.old_size = other.old_size;
        }
        if self.old_empties_len.is_none() {
            self.old_empties_len = other.old_empties_len;
        }
        for (folder, old) in other.old_counts {
            self.record_old_count(folder, old);
        }
        self.repartitioned.extend(other.repartitioned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(offset: u64) -> Route {
        Route::new("p0", offset, 10).unwrap()
    }

    #[test]
    fn test_empty_detection() {
        let mut batch = Batch::new("p0");
        assert!(batch.is_empty());
        batch.add_row_write(route(0), "1,a\n".into());
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_merge_keeps_first_old_values() {
        let mut delete = Batch::new("p0");
        delete.old_size = Some(10);
        delete.record_old_count(PathBuf::from("/idx/amount"), 3);

        let mut insert = Batch::new("p0");
        insert.old_size = Some(8);
        insert.record_old_count(PathBuf::from("/idx/amount"), 2);
        insert.add_index_write(PathBuf::from("/idx/a.index"), route(20));

        delete.merge(insert);
        assert_eq!(delete.old_size, Some(10));
        assert_eq!(delete.old_counts[&PathBuf::from("/idx/amount")], 3);
        assert_eq!(delete.index_writes.len(), 1);
    }
}
