//! Schema definitions: columns, storage modes, table schemas.

mod column;
mod mode;
mod table;

pub use column::Column;
pub use mode::Mode;
pub use table::{TableBuilder, TableSchema};
