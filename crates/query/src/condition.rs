//! Predicate trees over stored rows.
//!
//! A `Condition` is both an in-memory filter and a description the retrieval
//! planner can turn into index reads. `count_estimate` is the planner's
//! selectivity hint: equality conditions answer with the exact bucket size,
//! range conditions answer with a large sentinel so they lose the
//! driver-selection tie-break against any equality.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use strata_core::{Result, Row, Value};
use strata_index::IndexKey;
use strata_storage::Table;

/// Estimate reported by range conditions. Large enough that any real bucket
/// size beats it, without risking overflow when estimates are summed.
pub(crate) const RANGE_SCAN_ESTIMATE: u64 = u64::MAX / 4;

/// A predicate over rows of one table.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// Every row.
    All,
    /// Column equals a value.
    Equals { column: String, value: Value },
    /// Numeric column strictly greater than a bound.
    GreaterThan { column: String, bound: BigDecimal },
    /// Numeric column strictly less than a bound.
    LessThan { column: String, bound: BigDecimal },
    /// Date column strictly before a day.
    Before { column: String, bound: NaiveDate },
    /// Date column strictly after a day.
    After { column: String, bound: NaiveDate },
    /// Both sides hold.
    And(Box<Condition>, Box<Condition>),
    /// Either side holds. Retrieval concatenates both sides without
    /// deduplicating rows matching both.
    Or(Box<Condition>, Box<Condition>),
    /// Column value is one of a set.
    In { column: String, values: Vec<Value> },
}

impl Condition {
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Condition {
        Condition::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn greater_than(column: impl Into<String>, bound: impl Into<BigDecimal>) -> Condition {
        Condition::GreaterThan {
            column: column.into(),
            bound: bound.into(),
        }
    }

    pub fn less_than(column: impl Into<String>, bound: impl Into<BigDecimal>) -> Condition {
        Condition::LessThan {
            column: column.into(),
            bound: bound.into(),
        }
    }

    pub fn before(column: impl Into<String>, bound: NaiveDate) -> Condition {
        Condition::Before {
            column: column.into(),
            bound,
        }
    }

    pub fn after(column: impl Into<String>, bound: NaiveDate) -> Condition {
        Condition::After {
            column: column.into(),
            bound,
        }
    }

    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Condition {
        Condition::Or(Box::new(self), Box::new(other))
    }

    pub fn in_set(column: impl Into<String>, values: Vec<Value>) -> Condition {
        Condition::In {
            column: column.into(),
            values,
        }
    }

    /// Evaluates this condition against a row in memory.
    pub fn filter(&self, row: &Row) -> bool {
        match self {
            Condition::All => true,
            Condition::Equals { column, value } => row.get_or_null(column) == value,
            Condition::GreaterThan { column, bound } => row
                .get_or_null(column)
                .as_number()
                .is_some_and(|n| n > bound),
            Condition::LessThan { column, bound } => row
                .get_or_null(column)
                .as_number()
                .is_some_and(|n| n < bound),
            Condition::Before { column, bound } => row
                .get_or_null(column)
                .as_date()
                .is_some_and(|d| d < *bound),
            Condition::After { column, bound } => row
                .get_or_null(column)
                .as_date()
                .is_some_and(|d| d > *bound),
            Condition::And(left, right) => left.filter(row) && right.filter(row),
            Condition::Or(left, right) => left.filter(row) || right.filter(row),
            Condition::In { column, values } => {
                let actual = row.get_or_null(column);
                values.iter().any(|v| v == actual)
            }
        }
    }

    /// Selectivity hint for driver selection. `None` means unknown (the
    /// condition can only run as a scan), which the planner treats as the
    /// most expensive option.
    pub fn count_estimate(&self, table: &Table) -> Result<Option<u64>> {
        match self {
            Condition::All => Ok(Some(table.total_size()?)),
            Condition::Equals { column, value } => equals_estimate(table, column, value),
            Condition::GreaterThan { .. }
            | Condition::LessThan { .. }
            | Condition::Before { .. }
            | Condition::After { .. } => Ok(Some(RANGE_SCAN_ESTIMATE)),
            Condition::And(left, right) => {
                let left = left.count_estimate(table)?;
                let right = right.count_estimate(table)?;
                Ok(match (left, right) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (Some(a), None) | (None, Some(a)) => Some(a),
                    (None, None) => None,
                })
            }
            Condition::Or(left, right) => {
                let left = left.count_estimate(table)?;
                let right = right.count_estimate(table)?;
                Ok(left.zip(right).map(|(a, b)| a.saturating_add(b)))
            }
            Condition::In { column, values } => {
                let mut total = 0u64;
                for value in values {
                    match equals_estimate(table, column, value)? {
                        Some(n) => total = total.saturating_add(n),
                        None => return Ok(None),
                    }
                }
                Ok(Some(total))
            }
        }
    }
}

/// Exact bucket size of an equality condition, summed over partitions.
/// `None` when the column is unindexed or the value derives no index key.
fn equals_estimate(table: &Table, column: &str, value: &Value) -> Result<Option<u64>> {
    let schema = table.schema();
    if !schema.is_indexed(column) {
        return Ok(None);
    }
    let col = schema.require_column(column)?;
    let Some(key) = IndexKey::for_value(col.value_type(), value) else {
        return Ok(None);
    };
    let mut total = 0u64;
    for partition in table.partitions() {
        let file = key.resolve(
            &table.column_dir(partition, column),
            table.options().max_value_name,
        )?;
        total += strata_index::route_count(&file)?;
    }
    Ok(Some(total))
}
