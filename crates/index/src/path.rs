//! Index path construction and value-name sanitization.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Extension of every index bucket / value file.
pub(crate) const INDEX_EXT: &str = "index";

/// Default byte limit on a value used directly as a filename stem.
pub const DEFAULT_MAX_VALUE_NAME: usize = 50;

/// Directory holding all index metadata for one partition:
/// `root/<table>/META_<partition>`.
pub fn meta_dir(root: &Path, table: &str, partition: &str) -> PathBuf {
    root.join(table).join(format!("META_{partition}"))
}

/// Index directory for one column of one partition.
pub fn column_dir(root: &Path, table: &str, partition: &str, column: &str) -> PathBuf {
    meta_dir(root, table, partition).join(column)
}

/// Equality bucket file for a discrete value.
pub fn bucket_file(column_dir: &Path, field: &str, max_name: usize) -> PathBuf {
    column_dir.join(format!("{}.{INDEX_EXT}", sanitize(field, max_name)))
}

/// Turns a serialized value into a filesystem-safe filename stem.
///
/// Values that are empty, too long, or contain a path-unsafe character are
/// replaced by a fixed-width digest so the bucket name stays stable across
/// processes and platforms.
pub fn sanitize(field: &str, max_name: usize) -> String {
    if !field.is_empty() && field.len() <= max_name && field.chars().all(is_name_safe) {
        return field.to_string();
    }
    digest_name(field)
}

fn is_name_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '@')
        // a bare "." name would collide with the extension split
        || (c == '.')
}

/// UUID-shaped hex digest of the value bytes (truncated SHA-256).
fn digest_name(field: &str) -> String {
    let hash = Sha256::digest(field.as_bytes());
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        hash[0], hash[1], hash[2], hash[3],
        hash[4], hash[5],
        hash[6], hash[7],
        hash[8], hash[9],
        hash[10], hash[11], hash[12], hash[13], hash[14], hash[15],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_layout() {
        let dir = column_dir(Path::new("/data"), "orders", "p0", "customer");
        assert_eq!(dir, Path::new("/data/orders/META_p0/customer"));
    }

    #[test]
    fn test_safe_value_kept_verbatim() {
        assert_eq!(sanitize("Alice", DEFAULT_MAX_VALUE_NAME), "Alice");
        assert_eq!(sanitize("-12.5", DEFAULT_MAX_VALUE_NAME), "-12.5");
    }

    #[test]
    fn test_unsafe_value_digested() {
        let a = sanitize("a/b", DEFAULT_MAX_VALUE_NAME);
        let b = sanitize(&"x".repeat(51), DEFAULT_MAX_VALUE_NAME);
        let empty = sanitize("", DEFAULT_MAX_VALUE_NAME);
        for name in [&a, &b, &empty] {
            assert_eq!(name.len(), 36, "digest is uuid-shaped: {name}");
            assert!(!name.contains('/'));
        }
        // deterministic
        assert_eq!(a, sanitize("a/b", DEFAULT_MAX_VALUE_NAME));
        assert_ne!(a, b);
    }

    #[test]
    fn test_bucket_file_extension() {
        let file = bucket_file(Path::new("/idx"), "Alice", DEFAULT_MAX_VALUE_NAME);
        assert_eq!(file, Path::new("/idx/Alice.index"));
    }
}
