//! Strata Core - Core types and schema definitions for the Strata storage engine.
//!
//! This crate provides the foundational types shared by every layer of the
//! engine:
//!
//! - `ValueType`: Supported column types (Text, Number, Date)
//! - `Value`: Runtime values that can be stored in a table cell
//! - `Row`: A typed row together with its physical location, if written
//! - `Route`: A (partition, byte offset, byte length) pointer to a stored row
//! - `schema`: Schema definitions (Column, Mode, TableSchema)
//! - `Error`: Unified error type for engine operations
//!
//! # Example
//!
//! ```rust
//! use strata_core::{Row, Value, ValueType};
//! use strata_core::schema::{Mode, TableBuilder};
//!
//! let schema = TableBuilder::new("orders")
//!     .unwrap()
//!     .add_column("id", ValueType::Number)
//!     .unwrap()
//!     .add_column("customer", ValueType::Text)
//!     .unwrap()
//!     .mode(Mode::IndexAll)
//!     .build()
//!     .unwrap();
//!
//! let mut row = Row::new("orders");
//! row.set("id", Value::number(42));
//! row.set("customer", Value::Text("Alice".into()));
//!
//! assert_eq!(schema.columns().len(), 2);
//! assert_eq!(row.get("customer"), Some(&Value::Text("Alice".into())));
//! ```

mod error;
mod route;
mod row;
pub mod schema;
mod types;
mod value;

pub use error::{Error, Result};
pub use route::{Route, ROUTE_PACKED_LEN};
pub use row::Row;
pub use types::ValueType;
pub use value::Value;
