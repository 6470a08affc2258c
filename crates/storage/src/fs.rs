//! Raw byte-addressed file primitives.
//!
//! Everything above this module talks in terms of offsets and byte slices;
//! nothing here knows about rows, routes, or indices.

use byteorder::{BigEndian, ByteOrder};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use strata_core::Result;

/// Reads exactly `len` bytes at `offset`.
pub fn read_at(path: &Path, offset: u64, len: usize) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Overwrites bytes at `offset`. The file must exist; writing past the end
/// extends it.
pub fn write_at(path: &Path, offset: u64, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    Ok(())
}

/// Appends bytes, returning the offset they were written at.
pub fn append(path: &Path, bytes: &[u8]) -> Result<u64> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let offset = file.seek(SeekFrom::End(0))?;
    file.write_all(bytes)?;
    Ok(offset)
}

/// Truncates (or extends with zeros) to exactly `len` bytes.
pub fn truncate(path: &Path, len: u64) -> Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    Ok(())
}

/// Current file length; a missing file has length zero.
pub fn file_len(path: &Path) -> Result<u64> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Reads an 8-byte big-endian counter at `offset`.
pub fn read_u64_at(path: &Path, offset: u64) -> Result<u64> {
    let bytes = read_at(path, offset, 8)?;
    Ok(BigEndian::read_u64(&bytes))
}

/// Writes an 8-byte big-endian counter at `offset`.
pub fn write_u64_at(path: &Path, offset: u64, value: u64) -> Result<()> {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, value);
    write_at(path, offset, &buf)
}
