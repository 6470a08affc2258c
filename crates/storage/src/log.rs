//! Rollback log codec.
//!
//! One log per partition, line-oriented, written in full before any file
//! mutation. Record tags:
//!
//! - `I:<path>;<off,len>;...`  routes appended to an index file
//! - `ID:<path>;<off,len>;...` routes removed from an index file
//! - `E:<off,len>`             free-list slot consumed
//! - `N:<path>`                folder split (reconciled, never undone)
//! - `Rw:<off,len>;<line>`     inserted row and its exact line
//! - `Ro:<off,len>;<line>`     deleted row's pre-image line
//! - `TS:<n>`                  logical row count before the statement
//! - `ES:<n>`                  empties file byte length before the statement
//! - `C:<path>;<n>`            count file value before the statement
//! - `--`                      statement boundary
//!
//! The serialized row line is always the last field of `Rw`/`Ro`, so a row
//! containing `;` parses unambiguously.

use std::fs;
use std::path::{Path, PathBuf};
use strata_core::{Error, Result, Route};
use tracing::debug;

use crate::batch::Batch;

/// Rollback log path for a partition, next to its row file.
pub fn log_path(table_dir: &Path, partition: &str) -> PathBuf {
    table_dir.join(format!("{partition}.rollback"))
}

/// Returns whether a table-directory entry name is a rollback log.
pub fn is_log_name(name: &str) -> bool {
    name.ends_with(".rollback")
}

/// Writes a batch as one statement. `chain` appends to the existing log (a
/// statement joining an open transaction); otherwise the log is replaced.
pub fn write_log(path: &Path, batch: &Batch, chain: bool) -> Result<()> {
    let text = serialize_batch(batch);
    let result = if chain {
        use std::io::Write;
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(text.as_bytes()))
            .map_err(Error::from)
    } else {
        fs::write(path, &text).map_err(Error::from)
    };
    result.map_err(|e| {
        Error::rollback("", &batch.partition, format!("log write failed: {e}"))
    })?;
    debug!(log = %path.display(), chain, "rollback log written");
    Ok(())
}

/// Deletes the log after a completed rollback.
pub fn remove_log(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Reads the statements of a log, oldest first. A missing log is empty.
pub fn read_log(path: &Path, partition: &str) -> Result<Vec<Batch>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    parse_log(&content, partition)
        .map_err(|e| Error::rollback("", partition, format!("log parse failed: {e}")))
}

fn serialize_route(route: &Route) -> String {
    format!("{},{}", route.offset(), route.length())
}

fn parse_route(field: &str, partition: &str) -> Result<Route> {
    let (off, len) = field
        .split_once(',')
        .ok_or_else(|| Error::invalid_operation(format!("bad route field {field:?}")))?;
    let offset: u64 = off
        .parse()
        .map_err(|_| Error::invalid_operation(format!("bad route offset {off:?}")))?;
    let length: u32 = len
        .parse()
        .map_err(|_| Error::invalid_operation(format!("bad route length {len:?}")))?;
    Route::new(partition, offset, length)
}

fn serialize_batch(batch: &Batch) -> String {
    let mut out = String::new();
    for (path, routes) in &batch.index_writes {
        out.push_str(&format!("I:{}", path.display()));
        for route in routes {
            out.push(';');
            out.push_str(&serialize_route(route));
        }
        out.push('\n');
    }
    for (path, routes) in &batch.invalidated {
        out.push_str(&format!("ID:{}", path.display()));
        for route in routes {
            out.push(';');
            out.push_str(&serialize_route(route));
        }
        out.push('\n');
    }
    for route in &batch.consumed_empties {
        out.push_str(&format!("E:{}\n", serialize_route(route)));
    }
    for folder in &batch.repartitioned {
        out.push_str(&format!("N:{}\n", folder.display()));
    }
    for write in &batch.row_writes {
        out.push_str(&format!(
            "Rw:{};{}\n",
            serialize_route(&write.route),
            write.line.trim_end_matches('\n')
        ));
    }
    for write in &batch.deleted_rows {
        out.push_str(&format!(
            "Ro:{};{}\n",
            serialize_route(&write.route),
            write.line.trim_end_matches('\n')
        ));
    }
    if let Some(size) = batch.old_size {
        out.push_str(&format!("TS:{size}\n"));
    }
    if let Some(len) = batch.old_empties_len {
        out.push_str(&format!("ES:{len}\n"));
    }
    for (folder, old) in &batch.old_counts {
        out.push_str(&format!("C:{};{old}\n", folder.display()));
    }
    out.push_str("--\n");
    out
}

fn parse_log(content: &str, partition: &str) -> Result<Vec<Batch>> {
    let mut batches = Vec::new();
    let mut batch = Batch::new(partition);
    for line in content.lines() {
        if line.is_empty() {
            continue;
        }
        if line == "--" {
            batches.push(std::mem::replace(&mut batch, Batch::new(partition)));
            continue;
        }
        let (tag, rest) = line
            .split_once(':')
            .ok_or_else(|| Error::invalid_operation(format!("untagged log line {line:?}")))?;
        match tag {
            "I" | "ID" => {
                let mut fields = rest.split(';');
                let path = PathBuf::from(fields.next().unwrap_or_default());
                let routes: Vec<Route> = fields
                    .map(|f| parse_route(f, partition))
                    .collect::<Result<_>>()?;
                if tag == "I" {
                    batch.index_writes.insert(path, routes);
                } else {
                    batch.invalidated.insert(path, routes);
                }
            }
            "E" => batch.consumed_empties.push(parse_route(rest, partition)?),
            "N" => batch.repartitioned.push(PathBuf::from(rest)),
            "Rw" | "Ro" => {
                let (route, row_line) = rest.split_once(';').ok_or_else(|| {
                    Error::invalid_operation(format!("bad row record {line:?}"))
                })?;
                let route = parse_route(route, partition)?;
                let line = format!("{row_line}\n");
                if tag == "Rw" {
                    batch.add_row_write(route, line);
                } else {
                    batch.add_deleted_row(route, line);
                }
            }
            "TS" => {
                batch.old_size = Some(rest.parse().map_err(|_| {
                    Error::invalid_operation(format!("bad size {rest:?}"))
                })?);
            }
            "ES" => {
                batch.old_empties_len = Some(rest.parse().map_err(|_| {
                    Error::invalid_operation(format!("bad empties length {rest:?}"))
                })?);
            }
            "C" => {
                let (path, count) = rest.rsplit_once(';').ok_or_else(|| {
                    Error::invalid_operation(format!("bad count record {line:?}"))
                })?;
                let count: u64 = count.parse().map_err(|_| {
                    Error::invalid_operation(format!("bad count value {count:?}"))
                })?;
                batch.record_old_count(PathBuf::from(path), count);
            }
            _ => {
                return Err(Error::invalid_operation(format!(
                    "unknown log tag {tag:?}"
                )))
            }
        }
    }
    if !batch.is_empty() || batch.old_size.is_some() {
        batches.push(batch);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn route(offset: u64, length: u32) -> Route {
        Route::new("p0", offset, length).unwrap()
    }

    fn sample_batch() -> Batch {
        let mut batch = Batch::new("p0");
        batch.add_row_write(route(120, 19), "7,Alice,2024-03-01\n".into());
        batch.add_deleted_row(route(64, 17), "3,Bob,2024-01-05\n".into());
        batch.add_index_write(PathBuf::from("/idx/customer/Alice.index"), route(120, 19));
        batch.add_invalidated(PathBuf::from("/idx/customer/Bob.index"), route(64, 17));
        batch.consumed_empties.push(route(120, 19));
        batch.old_size = Some(12);
        batch.old_empties_len = Some(28);
        batch.record_old_count(PathBuf::from("/idx/id"), 4);
        batch.repartitioned.push(PathBuf::from("/idx/id/+50"));
        batch
    }

    #[test]
    fn test_log_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p0.rollback");
        let batch = sample_batch();

        write_log(&path, &batch, false).unwrap();
        let parsed = read_log(&path, "p0").unwrap();
        assert_eq!(parsed, vec![batch]);
    }

    #[test]
    fn test_chained_statements_parse_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p0.rollback");

        let mut first = Batch::new("p0");
        first.add_row_write(route(10, 5), "1,a,\n".into());
        first.old_size = Some(0);
        let mut second = Batch::new("p0");
        second.add_row_write(route(15, 5), "2,b,\n".into());
        second.old_size = Some(1);

        write_log(&path, &first, false).unwrap();
        write_log(&path, &second, true).unwrap();

        let parsed = read_log(&path, "p0").unwrap();
        assert_eq!(parsed, vec![first, second]);
    }

    #[test]
    fn test_replace_discards_previous_statement() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p0.rollback");

        write_log(&path, &sample_batch(), false).unwrap();
        let mut next = Batch::new("p0");
        next.add_row_write(route(1, 4), "9,x\n".into());
        write_log(&path, &next, false).unwrap();

        let parsed = read_log(&path, "p0").unwrap();
        assert_eq!(parsed, vec![next]);
    }

    #[test]
    fn test_row_with_semicolon_survives() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p0.rollback");
        let mut batch = Batch::new("p0");
        batch.add_row_write(route(0, 14), "1,a;b;c,\n".into());
        write_log(&path, &batch, false).unwrap();

        let parsed = read_log(&path, "p0").unwrap();
        assert_eq!(parsed[0].row_writes[0].line, "1,a;b;c,\n");
    }

    #[test]
    fn test_missing_log_is_empty() {
        let dir = tempdir().unwrap();
        assert!(read_log(&dir.path().join("none"), "p0").unwrap().is_empty());
    }

    #[test]
    fn test_garbage_log_is_rollback_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p0.rollback");
        std::fs::write(&path, "XX:nonsense\n").unwrap();
        assert!(matches!(
            read_log(&path, "p0"),
            Err(Error::Rollback { .. })
        ));
    }
}
