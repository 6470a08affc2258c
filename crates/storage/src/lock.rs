//! Per-partition mutual exclusion and mutable runtime state.
//!
//! The rollback-log-then-apply protocol tolerates at most one in-flight
//! mutating statement per partition, so every mutation takes the partition's
//! mutex across the whole "plan, write log, apply" section. Reads take it
//! only long enough to copy the state they need.

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use strata_core::{Error, Result};

use crate::breakpoints::Breakpoints;
use crate::empties::EmptiesPackage;

/// Mutable per-partition runtime state, guarded by the partition lock.
#[derive(Debug, Default)]
pub struct PartitionState {
    /// Ordinal-to-offset translation for the row file.
    pub breakpoints: Breakpoints,
    /// In-memory free-list mirror.
    pub empties: EmptiesPackage,
    /// Logical row count (mirrors the empties file header).
    pub size: u64,
    /// Row file byte length.
    pub file_len: u64,
}

/// Registry of partition locks for one table.
#[derive(Debug, Default)]
pub struct PartitionLocks {
    states: HashMap<String, Arc<Mutex<PartitionState>>>,
}

impl PartitionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a partition with its freshly built state.
    pub fn register(&mut self, partition: impl Into<String>, state: PartitionState) {
        self.states
            .insert(partition.into(), Arc::new(Mutex::new(state)));
    }

    /// Returns the lock for a partition.
    pub fn get(&self, table: &str, partition: &str) -> Result<Arc<Mutex<PartitionState>>> {
        self.states.get(partition).cloned().ok_or_else(|| {
            Error::invalid_operation(format!("unknown partition {partition} of table {table}"))
        })
    }

    /// Registered partition names, unordered.
    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }
}
