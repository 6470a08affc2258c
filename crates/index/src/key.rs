//! Index key derivation from column values.

use bigdecimal::BigDecimal;
use chrono::Datelike;
use std::path::{Path, PathBuf};
use strata_core::{Value, ValueType};

use crate::path::bucket_file;
use crate::tree;

/// Where a value lands inside its column's index structure.
///
/// Text values address a flat bucket; numbers descend the pivot tree; dates
/// first select a calendar-year folder and then descend a tree keyed by
/// milliseconds since the epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexKey {
    Bucket(String),
    Tree(BigDecimal),
    DateTree { year: i32, key: BigDecimal },
}

impl IndexKey {
    /// Derives the index key for a value of the given column type.
    /// Null values are not indexed and yield `None`.
    pub fn for_value(value_type: ValueType, value: &Value) -> Option<IndexKey> {
        match (value_type, value) {
            (_, Value::Null) => None,
            (ValueType::Text, v) => Some(IndexKey::Bucket(v.to_field())),
            (ValueType::Number, Value::Number(d)) => Some(IndexKey::Tree(d.normalized())),
            (ValueType::Date, v @ Value::Date(d)) => {
                let millis = v.date_millis()?;
                Some(IndexKey::DateTree {
                    year: d.year(),
                    key: BigDecimal::from(millis),
                })
            }
            // type mismatch between schema and row value
            _ => None,
        }
    }

    /// Returns the tree root this key descends from, if it is tree-shaped.
    /// For date keys this is the year folder under the column directory.
    pub fn tree_root(&self, column_dir: &Path) -> Option<PathBuf> {
        match self {
            IndexKey::Bucket(_) => None,
            IndexKey::Tree(_) => Some(column_dir.to_path_buf()),
            IndexKey::DateTree { year, .. } => Some(column_dir.join(year.to_string())),
        }
    }

    /// Resolves the index file this key currently addresses: the bucket file
    /// for text values, or the value file inside the leaf reached by
    /// descending the (possibly absent) tree.
    pub fn resolve(&self, column_dir: &Path, max_name: usize) -> strata_core::Result<PathBuf> {
        match self {
            IndexKey::Bucket(field) => Ok(bucket_file(column_dir, field, max_name)),
            IndexKey::Tree(key) => {
                let leaf = tree::descend(column_dir, key)?;
                Ok(tree::value_file(&leaf, key))
            }
            IndexKey::DateTree { year, key } => {
                let leaf = tree::descend(&column_dir.join(year.to_string()), key)?;
                Ok(tree::value_file(&leaf, key))
            }
        }
    }

    /// Returns the numeric key for tree-shaped variants.
    pub fn tree_key(&self) -> Option<&BigDecimal> {
        match self {
            IndexKey::Bucket(_) => None,
            IndexKey::Tree(key) | IndexKey::DateTree { key, .. } => Some(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_for_text() {
        let key = IndexKey::for_value(ValueType::Text, &Value::Text("Alice".into())).unwrap();
        assert_eq!(key, IndexKey::Bucket("Alice".into()));
    }

    #[test]
    fn test_key_for_number_normalizes() {
        use std::str::FromStr;
        let v = Value::parse("1.50", ValueType::Number).unwrap();
        let key = IndexKey::for_value(ValueType::Number, &v).unwrap();
        assert_eq!(key, IndexKey::Tree(BigDecimal::from_str("1.5").unwrap()));
    }

    #[test]
    fn test_key_for_date_buckets_by_year() {
        let key = IndexKey::for_value(ValueType::Date, &Value::date(2024, 6, 1)).unwrap();
        match key {
            IndexKey::DateTree { year, .. } => assert_eq!(year, 2024),
            other => panic!("expected date tree key, got {other:?}"),
        }
    }

    #[test]
    fn test_null_not_indexed() {
        assert_eq!(IndexKey::for_value(ValueType::Text, &Value::Null), None);
    }
}
