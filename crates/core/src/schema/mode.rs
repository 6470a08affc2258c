//! Storage modes controlling index maintenance and bookkeeping.

use super::column::Column;

/// Storage mode of a table.
///
/// The mode decides which columns get secondary indices and whether the
/// partition keeps free-list and size bookkeeping at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Every column is indexed; full free-list and size bookkeeping.
    IndexAll,
    /// Only columns flagged `indexed`; full bookkeeping.
    StorageSensitive,
    /// No automatic index maintenance; full bookkeeping.
    Manual,
    /// No indices, no free-list, no size counter. Every mutation rewrites
    /// the partition file; row count is derived by counting lines.
    Light,
}

impl Mode {
    /// Returns whether the engine maintains an index for this column.
    pub fn indexes(&self, column: &Column) -> bool {
        match self {
            Mode::IndexAll => true,
            Mode::StorageSensitive => column.is_indexed(),
            Mode::Manual | Mode::Light => false,
        }
    }

    /// Returns whether partitions keep a free-list file and size counter.
    #[inline]
    pub fn has_bookkeeping(&self) -> bool {
        !matches!(self, Mode::Light)
    }
}
