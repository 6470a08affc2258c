//! Database - main entry point for embedding the engine.
//!
//! A `Database` owns a root directory and a registry of open tables. Schemas
//! come from the embedding application; the directory layout stores column
//! names only, validated against the registered schema on open. Closing is
//! drop-based, there are no background threads.

use hashbrown::HashMap;
use parking_lot::RwLock;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use strata_core::schema::TableSchema;
use strata_core::{Error, Result, Row};
use strata_query::Condition;
use strata_storage::Table;
use tracing::info;

use crate::config::Config;

/// The main database interface.
///
/// Provides methods for:
/// - Creating and opening tables
/// - Statement operations (insert, delete, update, select, rollback)
/// - The startup maintenance pass over surviving rollback logs
pub struct Database {
    config: Config,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Database {
    /// Opens a database at the configured root, creating the directory if
    /// needed, and runs the startup maintenance pass: every index folder a
    /// surviving rollback log records as possibly-repartitioning is
    /// reconciled before any table is touched.
    pub fn open(config: Config) -> Result<Database> {
        fs::create_dir_all(&config.root)?;
        reconcile_surviving_logs(&config.root)?;
        Ok(Database {
            config,
            tables: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a table on disk with the configured default partition count
    /// and registers it.
    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        self.create_table_with(schema, self.config.default_partitions)
    }

    /// Creates a table on disk with an explicit partition count.
    pub fn create_table_with(&self, schema: TableSchema, partitions: usize) -> Result<()> {
        let name = schema.name().to_string();
        let table = Table::create(
            &self.config.root,
            schema,
            partitions,
            self.config.storage_options(),
        )?;
        self.tables.write().insert(name, Arc::new(table));
        Ok(())
    }

    /// Opens an existing table directory under this schema and registers it.
    pub fn open_table(&self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();
        let table = Table::open(&self.config.root, schema, self.config.storage_options())?;
        self.tables.write().insert(name, Arc::new(table));
        Ok(())
    }

    /// Gets a registered table by name.
    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::table_not_found(name))
    }

    /// Inserts rows into one partition of a table, attaching the chosen
    /// route to each row.
    pub fn insert(&self, table: &str, partition: &str, rows: &mut [Row]) -> Result<()> {
        strata_storage::insert(&*self.table(table)?, partition, rows)
    }

    /// Deletes previously retrieved rows.
    pub fn delete(&self, table: &str, rows: &[Row]) -> Result<()> {
        strata_storage::delete(&*self.table(table)?, rows)
    }

    /// Replaces previously retrieved rows with new ones in one statement.
    pub fn update(
        &self,
        table: &str,
        partition: &str,
        old_rows: &[Row],
        new_rows: &mut [Row],
    ) -> Result<()> {
        strata_storage::update(&*self.table(table)?, partition, old_rows, new_rows)
    }

    /// Retrieves the rows matching a condition.
    pub fn select(
        &self,
        table: &str,
        condition: &Condition,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Row>> {
        condition.retrieve(&*self.table(table)?, limit, offset)
    }

    /// Replays and removes a partition's rollback log.
    pub fn rollback(&self, table: &str, partition: &str) -> Result<()> {
        strata_storage::rollback(&*self.table(table)?, partition)
    }
}

/// Walks every table directory for surviving rollback logs and reconciles
/// the index folders they record as repartitioned. Logs are left in place;
/// undoing a statement stays a caller decision.
fn reconcile_surviving_logs(root: &Path) -> Result<()> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        for file in fs::read_dir(entry.path())? {
            let file = file?;
            let name = file.file_name();
            let Some(name) = name.to_str() else { continue };
            if !strata_storage::log::is_log_name(name) {
                continue;
            }
            let partition = name.trim_end_matches(".rollback");
            let batches = strata_storage::log::read_log(&file.path(), partition)?;
            let mut folders = 0;
            for batch in &batches {
                for folder in &batch.repartitioned {
                    if folder.exists() {
                        strata_index::reconcile(folder)?;
                        folders += 1;
                    }
                }
            }
            if folders > 0 {
                info!(
                    log = %file.path().display(),
                    folders,
                    "reconciled repartitioned index folders from surviving log"
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::schema::TableBuilder;
    use strata_core::{Value, ValueType};
    use tempfile::tempdir;

    fn orders_schema() -> TableSchema {
        TableBuilder::new("orders")
            .unwrap()
            .add_column("id", ValueType::Number)
            .unwrap()
            .add_column("customer", ValueType::Text)
            .unwrap()
            .build()
            .unwrap()
    }

    fn open_db(root: &Path) -> Database {
        Database::open(Config::builder().root(root).build()).unwrap()
    }

    #[test]
    fn test_create_insert_select() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table(orders_schema()).unwrap();

        let mut rows = vec![];
        for (id, customer) in [(1, "Alice"), (2, "Bob")] {
            let mut row = Row::new("orders");
            row.set("id", Value::number(id))
                .set("customer", Value::Text(customer.into()));
            rows.push(row);
        }
        db.insert("orders", "p0", &mut rows).unwrap();

        let found = db
            .select("orders", &Condition::equals("customer", "Bob"), None, 0)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("id"), Some(&Value::number(2)));
    }

    #[test]
    fn test_reopen_registers_from_disk() {
        let dir = tempdir().unwrap();
        {
            let db = open_db(dir.path());
            db.create_table(orders_schema()).unwrap();
            let mut row = Row::new("orders");
            row.set("id", Value::number(1))
                .set("customer", Value::Text("Alice".into()));
            db.insert("orders", "p0", &mut [row]).unwrap();
        }

        let db = open_db(dir.path());
        assert!(db.table("orders").is_err());
        db.open_table(orders_schema()).unwrap();
        assert_eq!(db.table("orders").unwrap().total_size().unwrap(), 1);
    }

    #[test]
    fn test_open_is_clean_on_empty_root() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir.path().join("fresh"));
        assert!(db.table("anything").is_err());
    }
}
