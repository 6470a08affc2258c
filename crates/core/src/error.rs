//! Error types for the Strata storage engine.

use thiserror::Error;

/// Result type alias for Strata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Strata storage engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Generic disk error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored line failed to parse against the current schema.
    #[error("corrupted row in {table}/{partition}: {message}")]
    CorruptRow {
        table: String,
        partition: String,
        message: String,
    },

    /// Rollback log write, parse, or replay failure. Unrecoverable once
    /// replay has begun.
    #[error("rollback failed for {table}/{partition}: {message}")]
    Rollback {
        table: String,
        partition: String,
        message: String,
    },

    /// Index creation or read failure.
    #[error("index error at {path}: {message}")]
    Index { path: String, message: String },

    /// Schema lookup miss.
    #[error("table not found: {name}")]
    TableNotFound { name: String },

    /// The named directory exists but does not hold a table layout.
    #[error("not a table: {path}")]
    NotATable { path: String },

    /// Table definition could not be parsed.
    #[error("table parse error: {message}")]
    TableParse { message: String },

    /// Column not found in a table schema.
    #[error("column {column} not found in table {table}")]
    ColumnNotFound { table: String, column: String },

    /// Invalid schema definition.
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    /// Invalid operation.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    /// Creates a corrupted-row error.
    pub fn corrupt_row(
        table: impl Into<String>,
        partition: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::CorruptRow {
            table: table.into(),
            partition: partition.into(),
            message: message.into(),
        }
    }

    /// Creates a rollback error.
    pub fn rollback(
        table: impl Into<String>,
        partition: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Rollback {
            table: table.into(),
            partition: partition.into(),
            message: message.into(),
        }
    }

    /// Creates an index error.
    pub fn index(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Index {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a table-not-found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates a not-a-table error.
    pub fn not_a_table(path: impl Into<String>) -> Self {
        Error::NotATable { path: path.into() }
    }

    /// Creates a table parse error.
    pub fn table_parse(message: impl Into<String>) -> Self {
        Error::TableParse {
            message: message.into(),
        }
    }

    /// Creates a column-not-found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::table_not_found("orders");
        assert!(err.to_string().contains("orders"));

        let err = Error::corrupt_row("orders", "p0", "bad field count");
        assert!(err.to_string().contains("orders/p0"));

        let err = Error::index("/tmp/x.index", "truncated route");
        assert!(err.to_string().contains("truncated route"));
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
