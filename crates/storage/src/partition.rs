//! Partition row files: header line plus newline-terminated CSV rows.
//!
//! A route's length always covers the full line including the terminating
//! newline. Deleting a row overwrites the range with `length - 1` spaces and
//! a newline, so file length and every other row's offset stay fixed.

use std::fs;
use std::path::Path;
use strata_core::schema::TableSchema;
use strata_core::{Error, Result, Route, Row, Value};

use crate::fs::{read_at, write_at};

/// Serializes a row to its line form, newline included. Fields follow the
/// schema's physical column order; absent columns serialize as Null.
pub fn serialize_row(schema: &TableSchema, row: &Row) -> Result<String> {
    let mut line = String::new();
    for (i, column) in schema.columns().iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        let value = row.get_or_null(column.name());
        if let Some(ty) = value.value_type() {
            if ty != column.value_type() {
                return Err(Error::invalid_operation(format!(
                    "column {} expects {:?}, got {:?}",
                    column.name(),
                    column.value_type(),
                    ty
                )));
            }
        }
        let field = value.to_field();
        // the row file and the rollback log are both line-oriented
        if field.contains('\n') {
            return Err(Error::invalid_operation(format!(
                "column {} value contains a newline",
                column.name()
            )));
        }
        line.push_str(&quote_field(&field));
    }
    line.push('\n');
    Ok(line)
}

/// Quotes a field when it contains a delimiter or quote.
fn quote_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        let mut quoted = String::with_capacity(field.len() + 2);
        quoted.push('"');
        for c in field.chars() {
            if c == '"' {
                quoted.push('"');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    } else {
        field.to_string()
    }
}

/// Splits a row line into raw fields, honoring quoting.
fn split_fields(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        return Err(Error::table_parse(format!("unterminated quote in {line:?}")));
    }
    fields.push(field);
    Ok(fields)
}

/// Parses a row line against the schema. The caller attaches the route.
pub fn parse_row(schema: &TableSchema, partition: &str, line: &str) -> Result<Row> {
    let fields = split_fields(line)
        .map_err(|e| Error::corrupt_row(schema.name(), partition, e.to_string()))?;
    if fields.len() != schema.columns().len() {
        return Err(Error::corrupt_row(
            schema.name(),
            partition,
            format!(
                "expected {} fields, found {}",
                schema.columns().len(),
                fields.len()
            ),
        ));
    }
    let mut row = Row::new(schema.name());
    for (column, field) in schema.columns().iter().zip(fields) {
        let value = Value::parse(&field, column.value_type())
            .map_err(|e| Error::corrupt_row(schema.name(), partition, e.to_string()))?;
        if !value.is_null() {
            row.set(column.name(), value);
        }
    }
    Ok(row)
}

/// Returns whether a line holds only deletion padding.
pub fn is_blank(line: &str) -> bool {
    line.chars().all(|c| c == ' ')
}

/// Creates a fresh partition file containing only the header line.
pub fn create(path: &Path, schema: &TableSchema) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{}\n", schema.header_line()))?;
    Ok(())
}

/// Reads the line a route covers, without its trailing newline.
pub fn read_line_at(path: &Path, table: &str, route: &Route) -> Result<String> {
    let bytes = read_at(path, route.offset(), route.length() as usize)?;
    let mut line = String::from_utf8(bytes).map_err(|e| {
        Error::corrupt_row(table, route.partition(), format!("non-utf8 row bytes: {e}"))
    })?;
    if line.ends_with('\n') {
        line.pop();
    }
    Ok(line)
}

/// Reads and parses the row at a route. Returns `None` for a deleted slot.
pub fn read_row_at(
    path: &Path,
    schema: &TableSchema,
    route: &Route,
) -> Result<Option<Row>> {
    let line = read_line_at(path, schema.name(), route)?;
    if is_blank(&line) {
        return Ok(None);
    }
    let mut row = parse_row(schema, route.partition(), &line)?;
    row.set_route(route.clone());
    Ok(Some(row))
}

/// Overwrites a route's range with deletion padding.
pub fn whitespace_at(path: &Path, route: &Route) -> Result<()> {
    let len = route.length() as usize;
    if len == 0 {
        return Ok(());
    }
    let mut padding = vec![b' '; len];
    padding[len - 1] = b'\n';
    write_at(path, route.offset(), &padding)
}

/// One line of a sequential partition scan.
#[derive(Clone, Debug)]
pub struct ScanLine {
    pub offset: u64,
    /// Line length including the newline.
    pub length: u32,
    /// Line content without the newline.
    pub text: String,
}

/// Full sequential scan of a partition file.
#[derive(Debug)]
pub struct PartitionScan {
    pub header: String,
    /// Header line length including the newline.
    pub header_len: u64,
    pub lines: Vec<ScanLine>,
}

/// Scans a partition file into its header and lines. The layout is
/// self-describing, so this is how per-partition state is rebuilt at open.
pub fn scan(path: &Path, table: &str, partition: &str) -> Result<PartitionScan> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::corrupt_row(table, partition, format!("unreadable file: {e}")))?;
    let mut offset = 0u64;
    let mut header = None;
    let mut lines = Vec::new();
    for line in content.split_inclusive('\n') {
        let text = line.strip_suffix('\n').unwrap_or(line);
        let length = line.len() as u32;
        if header.is_none() {
            header = Some((text.to_string(), u64::from(length)));
        } else {
            lines.push(ScanLine {
                offset,
                length,
                text: text.to_string(),
            });
        }
        offset += u64::from(length);
    }
    let (header, header_len) = header
        .ok_or_else(|| Error::corrupt_row(table, partition, "missing header line"))?;
    Ok(PartitionScan {
        header,
        header_len,
        lines,
    })
}

/// Scans the live rows of a partition, routes attached.
pub fn scan_rows(path: &Path, schema: &TableSchema, partition: &str) -> Result<Vec<Row>> {
    let scan = scan(path, schema.name(), partition)?;
    let mut rows = Vec::new();
    for line in scan.lines {
        if is_blank(&line.text) {
            continue;
        }
        let mut row = parse_row(schema, partition, &line.text)?;
        row.set_route(Route::new(partition, line.offset, line.length)?);
        rows.push(row);
    }
    Ok(rows)
}
