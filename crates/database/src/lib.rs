//! Strata database - embedding API for the file-backed table engine.
//!
//! - `config`: the `Config` context object threaded through every call
//! - `database`: the `Database` surface — table lifecycle, statement
//!   operations, and the startup maintenance pass
//!
//! The commonly used types of the lower crates are re-exported so an
//! embedder needs only this crate.

pub mod config;
pub mod database;

pub use config::{Config, ConfigBuilder};
pub use database::Database;

pub use strata_core::schema::{Column, Mode, TableBuilder, TableSchema};
pub use strata_core::{Error, Result, Route, Row, Value, ValueType};
pub use strata_query::Condition;
pub use strata_storage::Table;
