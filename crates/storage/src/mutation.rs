//! The transactional batch engine: Insert, Delete, Update, Rollback.
//!
//! Every statement follows the same protocol under its partition lock:
//! build the full `Batch` of deltas in memory, serialize it to the rollback
//! log, then apply the deltas to the row file, index files, free-list, and
//! counters. A failure before the log is written aborts with no on-disk
//! effect; a failure during apply surfaces to the caller with the durable
//! log as the input for `rollback`.

use bigdecimal::BigDecimal;
use hashbrown::HashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use strata_core::schema::Mode;
use strata_core::{Error, Result, Route, Row};
use strata_index::{bucket_file, IndexKey};
use tracing::debug;

use crate::batch::Batch;
use crate::empties;
use crate::lock::PartitionState;
use crate::log;
use crate::partition;
use crate::table::Table;

/// Inserts rows into one partition, attaching the chosen route to each row.
pub fn insert(table: &Table, partition_name: &str, rows: &mut [Row]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let lock = table.partition_lock(partition_name)?;
    let mut state = lock.lock();
    if table.schema().mode() == Mode::Light {
        return insert_light(table, partition_name, rows, false);
    }
    let (batch, plan) = plan_insert(table, partition_name, &mut state, rows)?;

    if let Err(e) = log::write_log(&table.log_path(partition_name), &batch, false) {
        state.empties.restore_used();
        return Err(e);
    }
    state.empties.settle_used();
    apply_insert(table, partition_name, &mut state, &batch, &plan)
}

/// Deletes rows (located by their routes), partition by partition.
pub fn delete(table: &Table, rows: &[Row]) -> Result<()> {
    for (partition_name, group) in group_by_partition(rows)? {
        let lock = table.partition_lock(&partition_name)?;
        let mut state = lock.lock();
        if table.schema().mode() == Mode::Light {
            delete_light(table, &partition_name, &group, false)?;
            continue;
        }
        let (mut batch, tree_files) = plan_delete(table, &partition_name, &state, &group)?;
        let count_writes = plan_delete_counts(&mut batch, &tree_files)?;
        log::write_log(&table.log_path(&partition_name), &batch, false)?;
        apply_delete(table, &partition_name, &mut state, &batch, &count_writes)?;
    }
    Ok(())
}

/// Update: Delete of the old rows and Insert of the new ones, composed into
/// one batch and one rollback log statement.
pub fn update(
    table: &Table,
    partition_name: &str,
    old_rows: &[Row],
    new_rows: &mut [Row],
) -> Result<()> {
    let lock = table.partition_lock(partition_name)?;
    let mut state = lock.lock();
    if table.schema().mode() == Mode::Light {
        delete_light(table, partition_name, &old_rows.iter().collect::<Vec<_>>(), false)?;
        return insert_light(table, partition_name, new_rows, true);
    }
    for row in old_rows {
        let route = require_route(row)?;
        if route.partition() != partition_name {
            return Err(Error::invalid_operation(format!(
                "update spans partitions {} and {}",
                partition_name,
                route.partition()
            )));
        }
    }

    let group: Vec<&Row> = old_rows.iter().collect();
    // insert planning first: it may split index folders, moving value files,
    // and the delete side must resolve its paths against the post-split tree
    let (insert_batch, mut plan) = plan_insert(table, partition_name, &mut state, new_rows)?;
    let planned = plan_delete(table, partition_name, &state, &group).and_then(
        |(mut batch, tree_files)| {
            batch.merge(insert_batch);
            // computed over the merged batch: a value file the insert half
            // re-populates keeps counting
            let count_writes = plan_delete_counts(&mut batch, &tree_files)?;
            Ok((batch, count_writes))
        },
    );
    let (batch, count_writes) = match planned {
        Ok(v) => v,
        Err(e) => {
            state.empties.restore_used();
            return Err(e);
        }
    };
    for (leaf, new) in &mut plan.count_writes {
        // the insert half read counts before the delete decrement landed
        if let Some((_, delete_new)) = count_writes.iter().find(|(l, _)| l == leaf) {
            if let Some(old) = batch.old_counts.get(leaf) {
                *new -= old - delete_new;
            }
        }
    }

    if let Err(e) = log::write_log(&table.log_path(partition_name), &batch, false) {
        state.empties.restore_used();
        return Err(e);
    }
    state.empties.settle_used();
    apply_delete(table, partition_name, &mut state, &batch, &count_writes)?;
    apply_insert(table, partition_name, &mut state, &batch, &plan)
}

/// Replays the partition's rollback log, most recent statement first, then
/// deletes the log and reloads the partition state from disk.
pub fn rollback(table: &Table, partition_name: &str) -> Result<()> {
    let lock = table.partition_lock(partition_name)?;
    {
        let _guard = lock.lock();
        let log_path = table.log_path(partition_name);
        let batches = log::read_log(&log_path, partition_name)?;
        if batches.is_empty() {
            return Ok(());
        }
        if table.schema().mode() == Mode::Light {
            rollback_light(table, partition_name, &batches)?;
        } else {
            for batch in batches.iter().rev() {
                replay(table, partition_name, batch)?;
            }
        }
        log::remove_log(&log_path)?;
        debug!(partition = partition_name, statements = batches.len(), "rollback replayed");
    }
    table.reload_partition(partition_name)
}

fn require_route(row: &Row) -> Result<&Route> {
    row.route().ok_or_else(|| {
        Error::invalid_operation("row has no route; only retrieved rows can be deleted")
    })
}

fn group_by_partition<'a>(rows: &'a [Row]) -> Result<BTreeMap<String, Vec<&'a Row>>> {
    let mut groups: BTreeMap<String, Vec<&Row>> = BTreeMap::new();
    for row in rows {
        let route = require_route(row)?;
        groups.entry(route.partition().to_string()).or_default().push(row);
    }
    Ok(groups)
}

// ---------------------------------------------------------------- insert --

struct InsertPlan {
    /// Lengths of appended lines, in append order.
    appended: Vec<u32>,
    /// Logged count-file updates: (leaf, new value).
    count_writes: Vec<(PathBuf, u64)>,
    new_file_len: u64,
}

fn plan_insert(
    table: &Table,
    partition_name: &str,
    state: &mut PartitionState,
    rows: &mut [Row],
) -> Result<(Batch, InsertPlan)> {
    let schema = table.schema();
    let mut batch = Batch::new(partition_name);
    batch.old_size = Some(state.size);
    batch.old_empties_len = Some(empties::length(&table.empties_path(partition_name))?);

    // choose a route per row: exact-length free-list reuse, else append
    let mut appended = Vec::new();
    let mut append_off = state.file_len;
    for row in rows.iter_mut() {
        let line = partition::serialize_row(schema, row)?;
        let length = line.len() as u32;
        let route = match state.empties.pop_empty(length) {
            Some(route) => route,
            None => {
                let route = Route::new(partition_name, append_off, length)?;
                append_off += u64::from(length);
                appended.push(length);
                route
            }
        };
        batch.add_row_write(route.clone(), line);
        row.set_route(route);
    }
    batch.consumed_empties = state.empties.used_routes();

    // index planning: group tree keys per root so folder splits happen
    // before write paths are finalized
    let mut entries: Vec<(Route, PathBuf, IndexKey)> = Vec::new();
    let mut tree_keys: BTreeMap<PathBuf, BTreeSet<BigDecimal>> = BTreeMap::new();
    for (row, write) in rows.iter().zip(&batch.row_writes) {
        for column in schema.indexed_columns() {
            let value = row.get_or_null(column.name());
            let Some(key) = IndexKey::for_value(column.value_type(), value) else {
                continue;
            };
            let column_dir = table.column_dir(partition_name, column.name());
            if let Some(root) = key.tree_root(&column_dir) {
                if let Some(tree_key) = key.tree_key() {
                    tree_keys.entry(root).or_default().insert(tree_key.clone());
                }
            }
            entries.push((write.route.clone(), column_dir, key));
        }
    }

    let nps = table.options().numeric_partition_size;
    let mut assigned: BTreeMap<PathBuf, BTreeMap<BigDecimal, PathBuf>> = BTreeMap::new();
    let mut count_writes = Vec::new();
    for (root, keys) in tree_keys {
        let plan = plan_tree_keys(&root, keys, nps)?;
        for folder in plan.repartitioned {
            batch.repartitioned.push(folder);
        }
        for (leaf, old, new) in plan.count_updates {
            batch.record_old_count(leaf.clone(), old);
            count_writes.push((leaf, new));
        }
        assigned.insert(root, plan.assigned);
    }

    // final write paths, after any splits
    let max_name = table.options().max_value_name;
    for (route, column_dir, key) in entries {
        let file = match &key {
            IndexKey::Bucket(field) => bucket_file(&column_dir, field, max_name),
            IndexKey::Tree(_) | IndexKey::DateTree { .. } => {
                let root = key.tree_root(&column_dir).ok_or_else(|| {
                    Error::index(column_dir.display().to_string(), "tree key without root")
                })?;
                let tree_key = key.tree_key().ok_or_else(|| {
                    Error::index(column_dir.display().to_string(), "tree key without value")
                })?;
                let leaf = match assigned.get(&root).and_then(|m| m.get(tree_key)) {
                    Some(leaf) => leaf.clone(),
                    None => strata_index::descend(&root, tree_key)?,
                };
                strata_index::value_file(&leaf, tree_key)
            }
        };
        batch.add_index_write(file, route);
    }

    let plan = InsertPlan {
        appended,
        count_writes,
        new_file_len: append_off,
    };
    Ok((batch, plan))
}

struct TreePlan {
    /// new distinct key -> final leaf.
    assigned: BTreeMap<BigDecimal, PathBuf>,
    repartitioned: Vec<PathBuf>,
    /// (leaf, old, new) for leaves whose counts are logged and applied
    /// normally; split children get their counts written here directly.
    count_updates: Vec<(PathBuf, u64, u64)>,
}

/// Plans new distinct keys into tree leaves, splitting any folder whose
/// distinct-value count would exceed the partition size. A folder splits at
/// most once per statement: the pivot is the incoming key, so a key below
/// every existing value would otherwise re-trigger the same split.
fn plan_tree_keys(root: &Path, keys: BTreeSet<BigDecimal>, nps: u64) -> Result<TreePlan> {
    let mut plan = TreePlan {
        assigned: BTreeMap::new(),
        repartitioned: Vec::new(),
        count_updates: Vec::new(),
    };
    let mut split: HashSet<PathBuf> = HashSet::new();

    for key in keys {
        loop {
            let leaf = strata_index::descend(root, &key)?;
            if strata_index::value_file(&leaf, &key).exists() {
                break; // existing distinct value, no count change
            }
            let planned = plan.assigned.values().filter(|l| **l == leaf).count() as u64;
            let disk = strata_index::read_count(&leaf)?;
            if disk + planned + 1 > nps && !split.contains(&leaf) {
                strata_index::repartition(&leaf, &key)?;
                split.insert(leaf.clone());
                plan.repartitioned.push(leaf.clone());
                // keys already planned into the split folder move to a child
                let moved: Vec<BigDecimal> = plan
                    .assigned
                    .iter()
                    .filter(|(_, l)| **l == leaf)
                    .map(|(k, _)| k.clone())
                    .collect();
                for k in moved {
                    let child = strata_index::descend(root, &k)?;
                    plan.assigned.insert(k, child);
                }
                continue;
            }
            plan.assigned.insert(key.clone(), leaf);
            break;
        }
    }

    // per-leaf count bookkeeping; leaves created by this statement's splits
    // get their counts written immediately (the split is not log-protected)
    let mut added: BTreeMap<PathBuf, u64> = BTreeMap::new();
    for leaf in plan.assigned.values() {
        *added.entry(leaf.clone()).or_default() += 1;
    }
    for (leaf, added) in added {
        let old = strata_index::read_count(&leaf)?;
        let inside_split = split.iter().any(|folder| leaf.starts_with(folder) && leaf != *folder);
        if inside_split {
            strata_index::write_count(&leaf, old + added)?;
        } else {
            plan.count_updates.push((leaf, old, old + added));
        }
    }
    Ok(plan)
}

fn apply_insert(
    table: &Table,
    partition_name: &str,
    state: &mut PartitionState,
    batch: &Batch,
    plan: &InsertPlan,
) -> Result<()> {
    let path = table.partition_path(partition_name);
    let empties_path = table.empties_path(partition_name);

    for write in &batch.row_writes {
        crate::fs::write_at(&path, write.route.offset(), write.line.as_bytes())?;
    }
    for (file, routes) in &batch.index_writes {
        strata_index::append_routes(file, routes)?;
    }
    for route in &batch.consumed_empties {
        empties::remove_route(&empties_path, route)?;
    }
    for (leaf, new) in &plan.count_writes {
        strata_index::write_count(leaf, *new)?;
    }
    let new_size = state.size + batch.row_writes.len() as u64;
    empties::write_size(&empties_path, new_size)?;

    state.size = new_size;
    state.file_len = state.file_len.max(plan.new_file_len);
    for length in &plan.appended {
        state.breakpoints.record(*length);
    }
    debug!(
        partition = partition_name,
        rows = batch.row_writes.len(),
        reused = batch.consumed_empties.len(),
        "insert applied"
    );
    Ok(())
}

// ---------------------------------------------------------------- delete --

fn plan_delete(
    table: &Table,
    partition_name: &str,
    state: &PartitionState,
    rows: &[&Row],
) -> Result<(Batch, BTreeMap<PathBuf, PathBuf>)> {
    let schema = table.schema();
    let path = table.partition_path(partition_name);
    let mut batch = Batch::new(partition_name);
    batch.old_size = Some(state.size);
    batch.old_empties_len = Some(empties::length(&table.empties_path(partition_name))?);

    // tree value file -> its leaf, for count decrements
    let mut tree_files: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
    let max_name = table.options().max_value_name;

    for row in rows {
        let route = require_route(row)?;
        let line = partition::read_line_at(&path, schema.name(), route)?;
        if partition::is_blank(&line) {
            return Err(Error::invalid_operation(format!(
                "row at {partition_name}:{} is already deleted",
                route.offset()
            )));
        }
        batch.add_deleted_row(route.clone(), format!("{line}\n"));

        for column in schema.indexed_columns() {
            let value = row.get_or_null(column.name());
            let Some(key) = IndexKey::for_value(column.value_type(), value) else {
                continue;
            };
            let column_dir = table.column_dir(partition_name, column.name());
            let file = key.resolve(&column_dir, max_name)?;
            if key.tree_key().is_some() {
                if let Some(parent) = file.parent() {
                    tree_files.insert(file.clone(), parent.to_path_buf());
                }
            }
            batch.add_invalidated(file, route.clone());
        }
    }

    Ok((batch, tree_files))
}

/// Plans the count decrements of a delete: a value file the statement fully
/// empties (and does not also write to) decrements its leaf's count.
fn plan_delete_counts(
    batch: &mut Batch,
    tree_files: &BTreeMap<PathBuf, PathBuf>,
) -> Result<Vec<(PathBuf, u64)>> {
    let mut decrements: BTreeMap<PathBuf, u64> = BTreeMap::new();
    for (file, routes) in &batch.invalidated {
        let Some(leaf) = tree_files.get(file) else {
            continue;
        };
        if batch.index_writes.contains_key(file) {
            continue;
        }
        if strata_index::route_count(file)? == routes.len() as u64 {
            *decrements.entry(leaf.clone()).or_default() += 1;
        }
    }
    let mut count_writes = Vec::new();
    for (leaf, dec) in decrements {
        let old = strata_index::read_count(&leaf)?;
        batch.record_old_count(leaf.clone(), old);
        count_writes.push((leaf, old.saturating_sub(dec)));
    }
    Ok(count_writes)
}

fn apply_delete(
    table: &Table,
    partition_name: &str,
    state: &mut PartitionState,
    batch: &Batch,
    count_writes: &[(PathBuf, u64)],
) -> Result<()> {
    let path = table.partition_path(partition_name);
    let empties_path = table.empties_path(partition_name);

    for write in &batch.deleted_rows {
        partition::whitespace_at(&path, &write.route)?;
        empties::append_route(&empties_path, &write.route)?;
        state.empties.push(write.route.clone());
    }
    for (file, routes) in &batch.invalidated {
        for route in routes {
            // the file was resolved under this partition's lock; a missing
            // route means the index and the batch disagree
            if !strata_index::remove_route(file, route)? {
                return Err(Error::index(
                    file.display().to_string(),
                    format!(
                        "invalidated route {}+{} not present",
                        route.offset(),
                        route.length()
                    ),
                ));
            }
        }
    }
    for (leaf, new) in count_writes {
        strata_index::write_count(leaf, *new)?;
    }
    let new_size = state.size.saturating_sub(batch.deleted_rows.len() as u64);
    empties::write_size(&empties_path, new_size)?;
    state.size = new_size;
    debug!(
        partition = partition_name,
        rows = batch.deleted_rows.len(),
        "delete applied"
    );
    Ok(())
}

// -------------------------------------------------------------- rollback --

/// Replays one statement's deltas in reverse.
fn replay(table: &Table, partition_name: &str, batch: &Batch) -> Result<()> {
    let path = table.partition_path(partition_name);
    let empties_path = table.empties_path(partition_name);
    let consumed: HashSet<&Route> = batch.consumed_empties.iter().collect();

    // 1. undo written rows: reused slots go back to whitespace, appended
    //    rows fall off the end of the file
    let mut appended_start: Option<u64> = None;
    for write in &batch.row_writes {
        if consumed.contains(&write.route) {
            partition::whitespace_at(&path, &write.route)?;
        } else {
            let start = appended_start.get_or_insert(write.route.offset());
            *start = (*start).min(write.route.offset());
        }
    }
    if let Some(start) = appended_start {
        crate::fs::truncate(&path, start)?;
    }

    // 2. pop the index entries this statement wrote
    for (file, routes) in &batch.index_writes {
        for route in routes {
            strata_index::remove_route(file, route)?;
        }
    }

    // 3. restore deleted rows verbatim, with their index entries
    for write in &batch.deleted_rows {
        crate::fs::write_at(&path, write.route.offset(), write.line.as_bytes())?;
    }
    for (file, routes) in &batch.invalidated {
        strata_index::append_routes(file, routes)?;
    }

    // 4. free-list, size counter, and count files
    for write in &batch.deleted_rows {
        empties::remove_route(&empties_path, &write.route)?;
    }
    for route in &batch.consumed_empties {
        empties::append_route(&empties_path, route)?;
    }
    if let Some(size) = batch.old_size {
        empties::write_size(&empties_path, size)?;
    }
    for (folder, old) in &batch.old_counts {
        // a folder split after its count was recorded stays split; interior
        // folders carry no count
        if folder.exists() && strata_index::descend(folder, &BigDecimal::from(0))? == *folder {
            strata_index::write_count(folder, *old)?;
        }
    }

    if let Some(expected) = batch.old_empties_len {
        let actual = empties::length(&empties_path)?;
        if actual != expected {
            return Err(Error::rollback(
                table.schema().name(),
                partition_name,
                format!("empties length {actual} after replay, expected {expected}"),
            ));
        }
    }
    Ok(())
}

// ----------------------------------------------------------------- light --

/// Light-mode insert: log the rows, then rewrite the file with them
/// appended. No free-list, size counter, or index maintenance.
fn insert_light(table: &Table, partition_name: &str, rows: &mut [Row], chain: bool) -> Result<()> {
    let schema = table.schema();
    let path = table.partition_path(partition_name);
    let scan = partition::scan(&path, schema.name(), partition_name)?;

    let mut batch = Batch::new(partition_name);
    let mut offset = scan.header_len
        + scan.lines.iter().map(|l| u64::from(l.length)).sum::<u64>();
    let mut lines = Vec::new();
    for row in rows.iter_mut() {
        let line = partition::serialize_row(schema, row)?;
        let route = Route::new(partition_name, offset, line.len() as u32)?;
        offset += line.len() as u64;
        batch.add_row_write(route.clone(), line.clone());
        row.set_route(route);
        lines.push(line);
    }
    log::write_log(&table.log_path(partition_name), &batch, chain)?;

    let mut content = format!("{}\n", scan.header);
    for line in &scan.lines {
        content.push_str(&line.text);
        content.push('\n');
    }
    for line in lines {
        content.push_str(&line);
    }
    std::fs::write(&path, content)?;
    Ok(())
}

/// Light-mode delete: log the pre-images, then rewrite the file without the
/// matched lines.
fn delete_light(table: &Table, partition_name: &str, rows: &[&Row], chain: bool) -> Result<()> {
    let schema = table.schema();
    let path = table.partition_path(partition_name);
    let scan = partition::scan(&path, schema.name(), partition_name)?;

    let mut offsets: HashSet<u64> = HashSet::new();
    let mut batch = Batch::new(partition_name);
    for row in rows {
        let route = require_route(row)?;
        offsets.insert(route.offset());
        let line = partition::read_line_at(&path, schema.name(), route)?;
        batch.add_deleted_row(route.clone(), format!("{line}\n"));
    }
    log::write_log(&table.log_path(partition_name), &batch, chain)?;

    let mut content = format!("{}\n", scan.header);
    for line in &scan.lines {
        if offsets.contains(&line.offset) {
            continue;
        }
        content.push_str(&line.text);
        content.push('\n');
    }
    std::fs::write(&path, content)?;
    Ok(())
}

/// Light-mode rollback: rebuild the file from the surviving lines minus the
/// logged inserts plus the logged pre-images.
fn rollback_light(table: &Table, partition_name: &str, batches: &[Batch]) -> Result<()> {
    let schema = table.schema();
    let path = table.partition_path(partition_name);
    let scan = partition::scan(&path, schema.name(), partition_name)?;

    let mut lines: Vec<String> = scan
        .lines
        .iter()
        .filter(|l| !partition::is_blank(&l.text))
        .map(|l| l.text.clone())
        .collect();
    for batch in batches.iter().rev() {
        for write in &batch.row_writes {
            let target = write.line.trim_end_matches('\n');
            if let Some(pos) = lines.iter().position(|l| l == target) {
                lines.remove(pos);
            }
        }
        for write in &batch.deleted_rows {
            lines.push(write.line.trim_end_matches('\n').to_string());
        }
    }

    let mut content = format!("{}\n", scan.header);
    for line in lines {
        content.push_str(&line);
        content.push('\n');
    }
    std::fs::write(&path, content)?;
    Ok(())
}
