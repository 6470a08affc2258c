//! Index-driven retrieval with cost-based `And` planning and pagination.
//!
//! Every leaf condition resolves, per partition, either to a list of routes
//! read from the index or to a full partition scan. Partitions are fetched
//! in parallel and concatenated in partition order, so the row order of a
//! given condition is deterministic and pagination pages never overlap.

use chrono::Datelike;
use rayon::prelude::*;
use std::path::PathBuf;
use strata_core::{Result, Route, Row, Value, ValueType};
use strata_index::{IndexKey, RangeBound};
use strata_storage::Table;
use tracing::debug;

use crate::condition::Condition;

impl Condition {
    /// Retrieves the matching rows. `limit = None` means all matching rows;
    /// `offset` skips that many matches first.
    pub fn retrieve(
        &self,
        table: &Table,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Row>> {
        self.retrieve_with(table, &[], limit, offset)
    }

    fn retrieve_with(
        &self,
        table: &Table,
        parents: &[&Condition],
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Row>> {
        match self {
            Condition::And(left, right) => {
                let left_cost = cost(left.count_estimate(table)?);
                let right_cost = cost(right.count_estimate(table)?);
                let (driver, pushed) = if left_cost <= right_cost {
                    (left, right)
                } else {
                    (right, left)
                };
                debug!(left_cost, right_cost, "and: driving with cheaper side");
                let mut filters: Vec<&Condition> = parents.to_vec();
                filters.push(pushed);
                driver.retrieve_with(table, &filters, limit, offset)
            }
            Condition::Or(left, right) => {
                let mut rows = left.retrieve_with(table, parents, None, 0)?;
                rows.extend(right.retrieve_with(table, parents, None, 0)?);
                Ok(slice_page(rows, limit, offset))
            }
            _ => paginated(self, table, parents, limit, offset),
        }
    }
}

fn cost(estimate: Option<u64>) -> u64 {
    estimate.unwrap_or(u64::MAX)
}

/// Shared pagination loop: pull matching rows in expanding batches until
/// `limit + offset` are on hand or every partition is exhausted, then slice
/// the requested page.
fn paginated(
    cond: &Condition,
    table: &Table,
    parents: &[&Condition],
    limit: Option<usize>,
    offset: usize,
) -> Result<Vec<Row>> {
    let Some(limit) = limit else {
        let (rows, _) = fetch_partitions(cond, table, parents, None)?;
        return Ok(slice_page(rows, None, offset));
    };
    let needed = limit + offset;
    // scaled by the page size and the number of filters thinning candidates
    let mut cap = needed.max(1) * (parents.len() + 2);
    loop {
        let (rows, exhausted) = fetch_partitions(cond, table, parents, Some(cap))?;
        if rows.len() >= needed || exhausted {
            return Ok(slice_page(rows, Some(limit), offset));
        }
        cap *= 2;
    }
}

fn slice_page(rows: Vec<Row>, limit: Option<usize>, offset: usize) -> Vec<Row> {
    let rest = rows.into_iter().skip(offset);
    match limit {
        Some(limit) => rest.take(limit).collect(),
        None => rest.collect(),
    }
}

struct Fetched {
    rows: Vec<Row>,
    exhausted: bool,
}

/// Fetches each partition in parallel, concatenating in partition order.
fn fetch_partitions(
    cond: &Condition,
    table: &Table,
    parents: &[&Condition],
    cap: Option<usize>,
) -> Result<(Vec<Row>, bool)> {
    let fetched: Vec<Fetched> = table
        .partitions()
        .par_iter()
        .map(|partition| fetch_partition(cond, table, partition, parents, cap))
        .collect::<Result<Vec<_>>>()?;
    let exhausted = fetched.iter().all(|f| f.exhausted);
    let rows = fetched.into_iter().flat_map(|f| f.rows).collect();
    Ok((rows, exhausted))
}

/// Fetches up to `cap` matching rows of one partition, index-driven when the
/// condition resolves to routes and a filtered scan otherwise.
fn fetch_partition(
    cond: &Condition,
    table: &Table,
    partition: &str,
    parents: &[&Condition],
    cap: Option<usize>,
) -> Result<Fetched> {
    let matches =
        |row: &Row| cond.filter(row) && parents.iter().all(|parent| parent.filter(row));
    let mut rows = Vec::new();
    let mut exhausted = true;

    match candidate_routes(cond, table, partition)? {
        Some(routes) => {
            for route in &routes {
                if cap.is_some_and(|cap| rows.len() >= cap) {
                    exhausted = false;
                    break;
                }
                // the route may point at a slot deleted since the index read
                let Some(row) = table.read_row(route)? else {
                    continue;
                };
                if matches(&row) {
                    rows.push(row);
                }
            }
        }
        None if table.schema().mode().has_bookkeeping() => {
            // ordinal-addressed walk through the partition's breakpoints;
            // whitespaced slots read back as None and are skipped
            for ordinal in 0..table.line_count(partition)? {
                if cap.is_some_and(|cap| rows.len() >= cap) {
                    exhausted = false;
                    break;
                }
                let Some(route) = table.ordinal_route(partition, ordinal)? else {
                    break;
                };
                let Some(row) = table.read_row(&route)? else {
                    continue;
                };
                if matches(&row) {
                    rows.push(row);
                }
            }
        }
        // Light mode keeps no breakpoints current across rewrites
        None => {
            for row in table.scan_partition(partition)? {
                if cap.is_some_and(|cap| rows.len() >= cap) {
                    exhausted = false;
                    break;
                }
                if matches(&row) {
                    rows.push(row);
                }
            }
        }
    }
    Ok(Fetched { rows, exhausted })
}

/// Resolves a leaf condition to the index routes it should read in one
/// partition. `None` means the condition has no usable index there and must
/// scan.
fn candidate_routes(
    cond: &Condition,
    table: &Table,
    partition: &str,
) -> Result<Option<Vec<Route>>> {
    let schema = table.schema();
    match cond {
        Condition::Equals { column, value } => {
            if !schema.is_indexed(column) {
                return Ok(None);
            }
            let col = schema.require_column(column)?;
            let Some(key) = IndexKey::for_value(col.value_type(), value) else {
                return Ok(None);
            };
            let file = key.resolve(
                &table.column_dir(partition, column),
                table.options().max_value_name,
            )?;
            Ok(Some(strata_index::read_routes(&file, partition)?))
        }
        Condition::GreaterThan { column, bound } | Condition::LessThan { column, bound } => {
            if !schema.is_indexed(column)
                || schema.require_column(column)?.value_type() != ValueType::Number
            {
                return Ok(None);
            }
            let range = match cond {
                Condition::GreaterThan { .. } => RangeBound::Greater(bound.clone()),
                _ => RangeBound::Less(bound.clone()),
            };
            let files =
                strata_index::collect_range(&table.column_dir(partition, column), &range)?;
            routes_in_files(&files, partition).map(Some)
        }
        Condition::Before { column, bound } | Condition::After { column, bound } => {
            if !schema.is_indexed(column)
                || schema.require_column(column)?.value_type() != ValueType::Date
            {
                return Ok(None);
            }
            let Some(millis) = Value::Date(*bound).date_millis() else {
                return Ok(None);
            };
            let after = matches!(cond, Condition::After { .. });
            let files = date_range_files(
                &table.column_dir(partition, column),
                bound.year(),
                millis.into(),
                after,
            )?;
            routes_in_files(&files, partition).map(Some)
        }
        Condition::In { column, values } => {
            if !schema.is_indexed(column) {
                return Ok(None);
            }
            let col = schema.require_column(column)?;
            let mut routes = Vec::new();
            for value in values {
                let Some(key) = IndexKey::for_value(col.value_type(), value) else {
                    // a Null or mistyped member can only be found by scanning
                    return Ok(None);
                };
                let file = key.resolve(
                    &table.column_dir(partition, column),
                    table.options().max_value_name,
                )?;
                routes.extend(strata_index::read_routes(&file, partition)?);
            }
            Ok(Some(routes))
        }
        Condition::All | Condition::And(..) | Condition::Or(..) => Ok(None),
    }
}

fn routes_in_files(files: &[PathBuf], partition: &str) -> Result<Vec<Route>> {
    let mut routes = Vec::new();
    for file in files {
        routes.extend(strata_index::read_routes(file, partition)?);
    }
    Ok(routes)
}

/// Value files of a strict one-sided date range: whole years on the open
/// side of the boundary, a pruned tree walk inside the boundary year.
fn date_range_files(
    column_dir: &std::path::Path,
    boundary_year: i32,
    millis: bigdecimal::BigDecimal,
    after: bool,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for (year, dir) in strata_index::year_dirs(column_dir)? {
        if after {
            if year > boundary_year {
                files.extend(strata_index::collect_all(&dir)?);
            } else if year == boundary_year {
                files.extend(strata_index::collect_range(
                    &dir,
                    &RangeBound::Greater(millis.clone()),
                )?);
            }
        } else if year < boundary_year {
            files.extend(strata_index::collect_all(&dir)?);
        } else if year == boundary_year {
            files.extend(strata_index::collect_range(
                &dir,
                &RangeBound::Less(millis.clone()),
            )?);
        }
    }
    Ok(files)
}
