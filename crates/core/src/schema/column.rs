//! Column definition for Strata table schemas.

use crate::types::ValueType;

/// A column definition in a table schema. Immutable once the table is opened.
#[derive(Clone, Debug)]
pub struct Column {
    /// Column name.
    name: String,
    /// Semantic type of the column.
    value_type: ValueType,
    /// Whether this column carries a secondary index (honored per mode).
    indexed: bool,
    /// Whether values in this column must be unique.
    unique: bool,
    /// Column position in the table (0-based, physical field order).
    position: usize,
}

impl Column {
    /// Creates a new column definition.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            indexed: false,
            unique: false,
            position: 0,
        }
    }

    /// Flags this column for indexing under `Mode::StorageSensitive`.
    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    /// Sets whether this column has unique values.
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Sets the column position.
    pub(crate) fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    /// Returns the column name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value type.
    #[inline]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns whether this column is flagged for indexing.
    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Returns whether this column has unique values.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Returns the column position in physical field order.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value_type == other.value_type
    }
}
