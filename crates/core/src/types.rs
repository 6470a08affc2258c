//! Column type definitions for the Strata storage engine.

/// Semantic type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// UTF-8 text, indexed with flat equality buckets.
    Text,
    /// Arbitrary-precision decimal, indexed with a range-partition tree.
    Number,
    /// Calendar date, indexed with a year-bucketed range-partition tree.
    Date,
}

impl ValueType {
    /// Returns whether equality lookups on this type read a single bucket
    /// file (as opposed to descending a partition tree).
    pub fn is_discrete(&self) -> bool {
        matches!(self, ValueType::Text)
    }

    /// Returns whether range predicates are meaningful for this type.
    pub fn is_ordered(&self) -> bool {
        matches!(self, ValueType::Number | ValueType::Date)
    }
}
