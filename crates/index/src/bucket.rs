//! Index bucket files: consecutive 10-byte packed routes, no header.
//!
//! The same file format backs equality buckets of text columns and the
//! per-value leaf files of numeric trees.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use strata_core::{Error, Result, Route, ROUTE_PACKED_LEN};

/// Reads every route in a bucket file. A missing file is an empty bucket.
pub fn read_routes(path: &Path, partition: &str) -> Result<Vec<Route>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if bytes.len() % ROUTE_PACKED_LEN != 0 {
        return Err(Error::index(
            path.display().to_string(),
            format!("bucket length {} not a multiple of {ROUTE_PACKED_LEN}", bytes.len()),
        ));
    }
    bytes
        .chunks_exact(ROUTE_PACKED_LEN)
        .map(|chunk| Route::unpack(partition, chunk))
        .collect()
}

/// Number of routes in a bucket file, from its length alone.
pub fn route_count(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() / ROUTE_PACKED_LEN as u64),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Appends routes to a bucket file, creating it (and its directory) if
/// needed.
pub fn append_routes(path: &Path, routes: &[Route]) -> Result<()> {
    if routes.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut buf = Vec::with_capacity(routes.len() * ROUTE_PACKED_LEN);
    for route in routes {
        buf.extend_from_slice(&route.pack());
    }
    file.write_all(&buf)?;
    Ok(())
}

/// Removes one occurrence of a route from a bucket file by overwriting it
/// with the tail route and truncating. Deletes the file once empty.
///
/// Returns whether a matching route was found.
pub fn remove_route(path: &Path, route: &Route) -> Result<bool> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata()?.len();
    if len % ROUTE_PACKED_LEN as u64 != 0 {
        return Err(Error::index(
            path.display().to_string(),
            format!("bucket length {len} not a multiple of {ROUTE_PACKED_LEN}"),
        ));
    }

    let target = route.pack();
    let Some(pos) = find_packed(&mut file, &target)? else {
        return Ok(false);
    };

    let tail_off = len - ROUTE_PACKED_LEN as u64;
    if pos != tail_off {
        let mut tail = [0u8; ROUTE_PACKED_LEN];
        file.seek(SeekFrom::Start(tail_off))?;
        file.read_exact(&mut tail)?;
        file.seek(SeekFrom::Start(pos))?;
        file.write_all(&tail)?;
    }
    file.set_len(tail_off)?;
    drop(file);

    if tail_off == 0 {
        fs::remove_file(path)?;
    }
    Ok(true)
}

/// Byte offset of the first packed route equal to `target`.
fn find_packed(file: &mut File, target: &[u8; ROUTE_PACKED_LEN]) -> Result<Option<u64>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; ROUTE_PACKED_LEN];
    let mut pos = 0u64;
    loop {
        match file.read_exact(&mut buf) {
            Ok(()) => {
                if &buf == target {
                    return Ok(Some(pos));
                }
                pos += ROUTE_PACKED_LEN as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
}
