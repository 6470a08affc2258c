//! Physical row location descriptors.
//!
//! A `Route` points at one stored row: the partition that holds it, the byte
//! offset of its line, and the line's byte length (terminating newline
//! included). Index buckets and free-list files store routes in a packed
//! 10-byte form: a 6-byte big-endian offset followed by a 4-byte big-endian
//! length. The partition is implied by the file the packed route lives in.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Size in bytes of a packed route.
pub const ROUTE_PACKED_LEN: usize = 10;

/// Largest offset representable in the 6-byte packed form.
const MAX_OFFSET: u64 = (1 << 48) - 1;

/// Location of a stored row: partition, byte offset, byte length.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Route {
    partition: String,
    offset: u64,
    length: u32,
}

impl Route {
    /// Creates a route. Fails if the offset exceeds the 6-byte packed range.
    pub fn new(partition: impl Into<String>, offset: u64, length: u32) -> Result<Self> {
        if offset > MAX_OFFSET {
            return Err(Error::invalid_operation(format!(
                "route offset {offset} exceeds 6-byte range"
            )));
        }
        Ok(Route {
            partition: partition.into(),
            offset,
            length,
        })
    }

    /// Returns the partition identifier.
    #[inline]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Returns the byte offset of the row line.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the byte length of the row line, newline included.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Packs this route into its 10-byte on-disk form.
    pub fn pack(&self) -> [u8; ROUTE_PACKED_LEN] {
        let mut buf = [0u8; ROUTE_PACKED_LEN];
        BigEndian::write_uint(&mut buf[0..6], self.offset, 6);
        BigEndian::write_u32(&mut buf[6..10], self.length);
        buf
    }

    /// Unpacks a route from its 10-byte on-disk form. The partition comes
    /// from the file's location, not the bytes.
    pub fn unpack(partition: impl Into<String>, buf: &[u8]) -> Result<Self> {
        if buf.len() != ROUTE_PACKED_LEN {
            return Err(Error::invalid_operation(format!(
                "packed route must be {ROUTE_PACKED_LEN} bytes, got {}",
                buf.len()
            )));
        }
        Ok(Route {
            partition: partition.into(),
            offset: BigEndian::read_uint(&buf[0..6], 6),
            length: BigEndian::read_u32(&buf[6..10]),
        })
    }

    /// Returns true if this route covers the same byte range in the same
    /// partition as `other`.
    pub fn same_slot(&self, other: &Route) -> bool {
        self == other
    }
}
