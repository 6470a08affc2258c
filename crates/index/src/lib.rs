//! Strata Index - On-disk secondary index structures.
//!
//! Indices live under `root/<table>/META_<partition>/<column>/`:
//!
//! - Text columns use flat equality buckets: one `<value>.index` file per
//!   distinct value, holding consecutive 10-byte packed routes.
//! - Number columns use a binary range-partition tree of folders. A folder
//!   holds either terminal `<value>.index` files, or exactly two children
//!   `+<pivot>` / `-<pivot>` once its value count exceeds the configured
//!   partition size, plus a `c.count` file tracking the distinct-value count.
//! - Date columns convert to milliseconds since the epoch, pre-bucketed by a
//!   calendar-year folder, then reuse the numeric tree inside the year.
//!
//! Splitting a folder (repartition) is idempotently completable rather than
//! atomic; `recovery::reconcile` finishes or discards an interrupted split at
//! startup.

mod bucket;
mod key;
mod path;
mod recovery;
mod tree;

pub use bucket::{append_routes, read_routes, remove_route, route_count};
pub use key::IndexKey;
pub use path::{bucket_file, column_dir, meta_dir, sanitize, DEFAULT_MAX_VALUE_NAME};
pub use recovery::reconcile;
pub use tree::{
    collect_all, collect_range, descend, read_count, remove_count, repartition, value_file,
    write_count, year_dirs, RangeBound,
};
