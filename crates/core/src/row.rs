//! In-memory row representation.

use crate::route::Route;
use crate::value::Value;
use std::collections::BTreeMap;

/// A typed row, optionally carrying the physical location it was read from.
///
/// Rows are transient: callers build them for insertion, or receive them from
/// retrieval with the `route` populated so a later delete or update can find
/// the stored bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    table: String,
    values: BTreeMap<String, Value>,
    route: Option<Route>,
}

impl Row {
    /// Creates an empty row for the named table.
    pub fn new(table: impl Into<String>) -> Self {
        Row {
            table: table.into(),
            values: BTreeMap::new(),
            route: None,
        }
    }

    /// Returns the table this row belongs to.
    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Sets a column value, replacing any previous one.
    pub fn set(&mut self, column: impl Into<String>, value: Value) -> &mut Self {
        self.values.insert(column.into(), value);
        self
    }

    /// Returns the value stored for a column, if any.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Returns the value for a column, treating an absent column as Null.
    pub fn get_or_null(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&Value::Null)
    }

    /// Iterates over (column, value) pairs in column-name order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns with a value set.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no column has a value set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the physical location, if this row has been written or read.
    #[inline]
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Attaches a physical location to this row.
    pub fn set_route(&mut self, route: Route) {
        self.route = Some(route);
    }

    /// Detaches the physical location, e.g. when re-inserting a copy.
    pub fn clear_route(&mut self) -> Option<Route> {
        self.route.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_set_get() {
        let mut row = Row::new("orders");
        row.set("id", Value::number(7))
            .set("customer", Value::Text("Alice".into()));

        assert_eq!(row.table(), "orders");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&Value::number(7)));
        assert_eq!(row.get("missing"), None);
        assert!(row.get_or_null("missing").is_null());
    }

    #[test]
    fn test_row_route_lifecycle() {
        let mut row = Row::new("orders");
        assert!(row.route().is_none());

        let route = Route::new("p0", 64, 20).unwrap();
        row.set_route(route.clone());
        assert_eq!(row.route(), Some(&route));

        assert_eq!(row.clear_route(), Some(route));
        assert!(row.route().is_none());
    }

    #[test]
    fn test_row_values_ordered_by_column() {
        let mut row = Row::new("t");
        row.set("b", Value::number(2));
        row.set("a", Value::number(1));
        let names: Vec<&str> = row.values().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
