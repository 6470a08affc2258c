//! File-backed row storage.
//!
//! Each table is a directory of human-readable partition files: a header
//! line naming the columns, then one serialized row per line. Deleting a
//! row whitespaces its line in place and records the slot in a per-partition
//! free-list so a later insert of the same byte length can reuse it. Every
//! mutating statement writes a rollback log in full before touching any
//! file, which makes an interrupted statement replayable backwards.

pub mod batch;
pub mod breakpoints;
pub mod empties;
pub(crate) mod fs;
pub mod lock;
pub mod log;
pub mod mutation;
pub mod partition;
pub mod table;

pub use batch::{Batch, RowWrite};
pub use lock::{PartitionLocks, PartitionState};
pub use mutation::{delete, insert, rollback, update};
pub use table::{StorageOptions, Table};
