//! Table schema definition for Strata.

use super::column::Column;
use super::mode::Mode;
use crate::error::{Error, Result};
use crate::types::ValueType;

/// A table schema: name, ordered columns, storage mode.
///
/// Column insertion order is the physical field order in partition row
/// files. Schemas come from the embedding application, not from disk; the
/// on-disk layout only records column names (the row-file header line).
#[derive(Clone, Debug)]
pub struct TableSchema {
    /// Table name.
    name: String,
    /// Column definitions in physical field order.
    columns: Vec<Column>,
    /// Storage mode.
    mode: Mode,
}

impl TableSchema {
    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the columns in physical field order.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the storage mode.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Gets a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Gets a column by name, erroring if absent.
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| Error::column_not_found(&self.name, name))
    }

    /// Gets a column position by name.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Iterates over the columns the current mode maintains indices for.
    pub fn indexed_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| self.mode.indexes(c))
    }

    /// Returns whether the current mode maintains an index for this column.
    pub fn is_indexed(&self, name: &str) -> bool {
        self.column(name).is_some_and(|c| self.mode.indexes(c))
    }

    /// Comma-joined column names, the partition file's header line.
    pub fn header_line(&self) -> String {
        self.columns
            .iter()
            .map(Column::name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Builder for creating table schemas.
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
    mode: Mode,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            columns: Vec::new(),
            mode: Mode::IndexAll,
        })
    }

    /// Validates a name follows naming rules. Table and column names become
    /// directory components, so the rules are strict.
    fn check_naming_rules(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_schema("Name cannot be empty"));
        }
        let first = name.chars().next().unwrap();
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::invalid_schema(format!(
                "Name must start with letter or underscore: {name}"
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_schema(format!(
                "Name contains invalid characters: {name}"
            )));
        }
        Ok(())
    }

    /// Adds a column to the table.
    pub fn add_column(mut self, name: impl Into<String>, value_type: ValueType) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        if self.columns.iter().any(|c| c.name() == name) {
            return Err(Error::invalid_schema(format!(
                "Column already exists: {name}"
            )));
        }
        self.columns.push(Column::new(name, value_type));
        Ok(self)
    }

    /// Flags columns for indexing under `Mode::StorageSensitive`.
    pub fn add_indexed(mut self, columns: &[&str]) -> Result<Self> {
        for name in columns {
            let col = self
                .columns
                .iter_mut()
                .find(|c| c.name() == *name)
                .ok_or_else(|| Error::invalid_schema(format!("Column not found: {name}")))?;
            *col = col.clone().indexed(true);
        }
        Ok(self)
    }

    /// Flags columns as unique.
    pub fn add_unique(mut self, columns: &[&str]) -> Result<Self> {
        for name in columns {
            let col = self
                .columns
                .iter_mut()
                .find(|c| c.name() == *name)
                .ok_or_else(|| Error::invalid_schema(format!("Column not found: {name}")))?;
            *col = col.clone().unique(true);
        }
        Ok(self)
    }

    /// Sets the storage mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Builds the table schema.
    pub fn build(self) -> Result<TableSchema> {
        if self.columns.is_empty() {
            return Err(Error::invalid_schema(format!(
                "Table has no columns: {}",
                self.name
            )));
        }
        let columns: Vec<Column> = self
            .columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_position(i))
            .collect();
        Ok(TableSchema {
            name: self.name,
            columns,
            mode: self.mode,
        })
    }
}
