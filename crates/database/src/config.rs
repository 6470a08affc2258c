//! Database configuration.
//!
//! Centralized, explicitly threaded through calls; there is no process-wide
//! state.

use std::path::PathBuf;
use strata_storage::StorageOptions;

/// Configuration of one database instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory; each table lives in its own subdirectory.
    pub root: PathBuf,
    /// Distinct-value limit of a numeric index folder before it splits.
    pub numeric_partition_size: u64,
    /// Byte limit of a column value used directly as an index filename;
    /// longer or unsafe values are replaced by a digest.
    pub max_value_name: usize,
    /// Number of partitions given to newly created tables.
    pub default_partitions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./strata_data"),
            numeric_partition_size: 100,
            max_value_name: strata_index::DEFAULT_MAX_VALUE_NAME,
            default_partitions: 1,
        }
    }
}

impl Config {
    /// Create a new config builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub(crate) fn storage_options(&self) -> StorageOptions {
        StorageOptions {
            numeric_partition_size: self.numeric_partition_size,
            max_value_name: self.max_value_name,
        }
    }
}

/// Builder for Config.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the root data directory.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root = path.into();
        self
    }

    /// Set the numeric index folder split threshold.
    pub fn numeric_partition_size(mut self, size: u64) -> Self {
        self.config.numeric_partition_size = size;
        self
    }

    /// Set the index filename length limit.
    pub fn max_value_name(mut self, bytes: usize) -> Self {
        self.config.max_value_name = bytes;
        self
    }

    /// Set the partition count for newly created tables.
    pub fn default_partitions(mut self, count: usize) -> Self {
        self.config.default_partitions = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
