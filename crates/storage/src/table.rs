//! Table runtime: schema, partitions, and per-partition state rebuilt from
//! the self-describing directory layout.
//!
//! A table is a directory `root/<name>/` containing one row file per
//! partition, a `<partition>.empties` free-list file (except in Light mode),
//! a `<partition>.rollback` log while statements are in flight, and one
//! `META_<partition>/` directory per partition holding the index trees.

use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_core::schema::{Mode, TableSchema};
use strata_core::{Error, Result, Route, Row};
use tracing::debug;

use crate::breakpoints::Breakpoints;
use crate::empties::{self, EmptiesPackage};
use crate::lock::{PartitionLocks, PartitionState};
use crate::partition;

/// Tunables threaded through every storage call.
#[derive(Clone, Copy, Debug)]
pub struct StorageOptions {
    /// Distinct-value limit of a numeric index folder before it splits.
    pub numeric_partition_size: u64,
    /// Byte limit of a value used directly as an index filename.
    pub max_value_name: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        StorageOptions {
            numeric_partition_size: 100,
            max_value_name: strata_index::DEFAULT_MAX_VALUE_NAME,
        }
    }
}

/// An open table.
pub struct Table {
    schema: TableSchema,
    root: PathBuf,
    partitions: Vec<String>,
    locks: PartitionLocks,
    options: StorageOptions,
}

impl Table {
    /// Creates a table on disk with `partition_count` partitions named
    /// `p0..pN`, then opens it.
    pub fn create(
        root: &Path,
        schema: TableSchema,
        partition_count: usize,
        options: StorageOptions,
    ) -> Result<Table> {
        if partition_count == 0 {
            return Err(Error::invalid_schema("table needs at least one partition"));
        }
        let dir = root.join(schema.name());
        if dir.exists() {
            return Err(Error::invalid_operation(format!(
                "table {} already exists",
                schema.name()
            )));
        }
        fs::create_dir_all(&dir)?;
        for i in 0..partition_count {
            let name = format!("p{i}");
            partition::create(&dir.join(&name), &schema)?;
            if schema.mode().has_bookkeeping() {
                empties::create_file(&dir.join(format!("{name}.empties")))?;
            }
            fs::create_dir_all(dir.join(format!("META_{name}")))?;
        }
        debug!(table = schema.name(), partitions = partition_count, "table created");
        Table::open(root, schema, options)
    }

    /// Opens an existing table, rebuilding per-partition state by scanning
    /// the row files.
    pub fn open(root: &Path, schema: TableSchema, options: StorageOptions) -> Result<Table> {
        let dir = root.join(schema.name());
        if !dir.exists() {
            return Err(Error::table_not_found(schema.name()));
        }
        if !dir.is_dir() {
            return Err(Error::not_a_table(dir.display().to_string()));
        }

        let mut partitions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if entry.file_type()?.is_file() && !name.contains('.') {
                partitions.push(name.to_string());
            }
        }
        if partitions.is_empty() {
            return Err(Error::not_a_table(dir.display().to_string()));
        }
        partitions.sort();

        let mut locks = PartitionLocks::new();
        for name in &partitions {
            let state = build_state(&dir, &schema, name)?;
            locks.register(name.clone(), state);
        }
        debug!(table = schema.name(), partitions = partitions.len(), "table opened");
        Ok(Table {
            schema,
            root: root.to_path_buf(),
            partitions,
            locks,
            options,
        })
    }

    /// Returns the table schema.
    #[inline]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Returns the storage options.
    #[inline]
    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    /// Partition names in stable order.
    #[inline]
    pub fn partitions(&self) -> &[String] {
        &self.partitions
    }

    /// The table's directory.
    pub fn dir(&self) -> PathBuf {
        self.root.join(self.schema.name())
    }

    /// A partition's row file.
    pub fn partition_path(&self, partition: &str) -> PathBuf {
        self.dir().join(partition)
    }

    /// A partition's free-list file.
    pub fn empties_path(&self, partition: &str) -> PathBuf {
        self.dir().join(format!("{partition}.empties"))
    }

    /// A partition's rollback log.
    pub fn log_path(&self, partition: &str) -> PathBuf {
        crate::log::log_path(&self.dir(), partition)
    }

    /// An indexed column's directory for a partition.
    pub fn column_dir(&self, partition: &str, column: &str) -> PathBuf {
        strata_index::column_dir(&self.root, self.schema.name(), partition, column)
    }

    /// The lock guarding a partition's state and mutations.
    pub fn partition_lock(&self, partition: &str) -> Result<Arc<Mutex<PartitionState>>> {
        self.locks.get(self.schema.name(), partition)
    }

    /// Logical row count of a partition. In Light mode this counts the
    /// file's lines on demand.
    pub fn partition_size(&self, partition: &str) -> Result<u64> {
        if self.schema.mode() == Mode::Light {
            let rows = partition::scan_rows(
                &self.partition_path(partition),
                &self.schema,
                partition,
            )?;
            return Ok(rows.len() as u64);
        }
        Ok(self.partition_lock(partition)?.lock().size)
    }

    /// Logical row count across all partitions.
    pub fn total_size(&self) -> Result<u64> {
        let mut total = 0;
        for partition in &self.partitions {
            total += self.partition_size(partition)?;
        }
        Ok(total)
    }

    /// Total line count of a partition, whitespaced slots included. Not
    /// maintained in Light mode.
    pub fn line_count(&self, partition: &str) -> Result<u64> {
        Ok(self.partition_lock(partition)?.lock().breakpoints.lines())
    }

    /// Route of the line at `ordinal`, translated through the partition's
    /// breakpoints. `None` past the last line.
    pub fn ordinal_route(&self, partition: &str, ordinal: u64) -> Result<Option<Route>> {
        let lock = self.partition_lock(partition)?;
        let state = lock.lock();
        let (Some(offset), Some(length)) = (
            state.breakpoints.offset_of(ordinal),
            state.breakpoints.length_of(ordinal),
        ) else {
            return Ok(None);
        };
        drop(state);
        Ok(Some(Route::new(partition, offset, length)?))
    }

    /// Reads the row a route points at. `None` if the slot was deleted.
    pub fn read_row(&self, route: &Route) -> Result<Option<Row>> {
        partition::read_row_at(
            &self.partition_path(route.partition()),
            &self.schema,
            route,
        )
    }

    /// Live rows of one partition, routes attached.
    pub fn scan_partition(&self, partition: &str) -> Result<Vec<Row>> {
        partition::scan_rows(&self.partition_path(partition), &self.schema, partition)
    }

    /// Reloads a partition's state from disk, e.g. after a rollback replay.
    pub fn reload_partition(&self, partition: &str) -> Result<()> {
        let fresh = build_state(&self.dir(), &self.schema, partition)?;
        let lock = self.partition_lock(partition)?;
        *lock.lock() = fresh;
        Ok(())
    }
}

/// Rebuilds one partition's state with a single sequential scan.
fn build_state(dir: &Path, schema: &TableSchema, name: &str) -> Result<PartitionState> {
    let path = dir.join(name);
    let scan = partition::scan(&path, schema.name(), name)?;
    if scan.header != schema.header_line() {
        return Err(Error::table_parse(format!(
            "partition {name} header {:?} does not match schema {:?}",
            scan.header,
            schema.header_line()
        )));
    }
    let file_len = scan.header_len
        + scan
            .lines
            .iter()
            .map(|l| u64::from(l.length))
            .sum::<u64>();
    let breakpoints =
        Breakpoints::from_lengths(scan.header_len, scan.lines.iter().map(|l| l.length));

    let (empties, size) = if schema.mode().has_bookkeeping() {
        EmptiesPackage::load(&dir.join(format!("{name}.empties")), name)?
    } else {
        (EmptiesPackage::default(), 0)
    };

    Ok(PartitionState {
        breakpoints,
        empties,
        size,
        file_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::schema::TableBuilder;
    use strata_core::ValueType;
    use tempfile::tempdir;

    fn test_schema() -> TableSchema {
        TableBuilder::new("orders")
            .unwrap()
            .add_column("id", ValueType::Number)
            .unwrap()
            .add_column("customer", ValueType::Text)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_layout() {
        let dir = tempdir().unwrap();
        let table =
            Table::create(dir.path(), test_schema(), 2, StorageOptions::default()).unwrap();

        assert_eq!(table.partitions(), &["p0", "p1"]);
        assert!(table.partition_path("p0").is_file());
        assert!(table.empties_path("p1").is_file());
        assert!(dir.path().join("orders/META_p0").is_dir());
        assert_eq!(table.total_size().unwrap(), 0);
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = tempdir().unwrap();
        Table::create(dir.path(), test_schema(), 1, StorageOptions::default()).unwrap();
        assert!(
            Table::create(dir.path(), test_schema(), 1, StorageOptions::default()).is_err()
        );
    }

    #[test]
    fn test_open_missing_table() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Table::open(dir.path(), test_schema(), StorageOptions::default()),
            Err(Error::TableNotFound { .. })
        ));
    }

    #[test]
    fn test_open_rejects_header_mismatch() {
        let dir = tempdir().unwrap();
        Table::create(dir.path(), test_schema(), 1, StorageOptions::default()).unwrap();

        let other = TableBuilder::new("orders")
            .unwrap()
            .add_column("different", ValueType::Text)
            .unwrap()
            .build()
            .unwrap();
        assert!(matches!(
            Table::open(dir.path(), other, StorageOptions::default()),
            Err(Error::TableParse { .. })
        ));
    }

    #[test]
    fn test_open_rebuilds_state() {
        let dir = tempdir().unwrap();
        let schema = test_schema();
        Table::create(dir.path(), schema.clone(), 1, StorageOptions::default()).unwrap();

        // write two rows by hand, then reopen
        let path = dir.path().join("orders/p0");
        crate::fs::append(&path, b"1,Alice\n2,Bob\n").unwrap();
        empties::write_size(&dir.path().join("orders/p0.empties"), 2).unwrap();

        let table = Table::open(dir.path(), schema, StorageOptions::default()).unwrap();
        assert_eq!(table.partition_size("p0").unwrap(), 2);
        let state = table.partition_lock("p0").unwrap();
        let guard = state.lock();
        assert_eq!(guard.breakpoints.lines(), 2);
        assert_eq!(guard.file_len, crate::fs::file_len(&path).unwrap());
    }

    #[test]
    fn test_ordinal_routes_address_every_line() {
        let dir = tempdir().unwrap();
        let schema = test_schema();
        Table::create(dir.path(), schema.clone(), 1, StorageOptions::default()).unwrap();

        // header "id,customer\n" is 12 bytes; lines of 8 and 6 bytes
        let path = dir.path().join("orders/p0");
        crate::fs::append(&path, b"1,Alice\n2,Bob\n").unwrap();
        empties::write_size(&dir.path().join("orders/p0.empties"), 2).unwrap();

        let table = Table::open(dir.path(), schema, StorageOptions::default()).unwrap();
        assert_eq!(table.line_count("p0").unwrap(), 2);
        assert_eq!(
            table.ordinal_route("p0", 0).unwrap(),
            Some(Route::new("p0", 12, 8).unwrap())
        );
        assert_eq!(
            table.ordinal_route("p0", 1).unwrap(),
            Some(Route::new("p0", 20, 6).unwrap())
        );
        assert_eq!(table.ordinal_route("p0", 2).unwrap(), None);

        let row = table
            .read_row(&table.ordinal_route("p0", 1).unwrap().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(row.get("id"), Some(&strata_core::Value::number(2)));
    }
}
