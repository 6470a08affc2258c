//! Condition trees and the retrieval planner.
//!
//! - `condition`: the closed `Condition` predicate enum with in-memory
//!   filtering and selectivity estimation
//! - `retrieve`: index-driven retrieval with cost-based `And` driver
//!   selection, `Or` concatenation, and expanding-batch pagination

pub mod condition;
mod retrieve;

pub use condition::Condition;
