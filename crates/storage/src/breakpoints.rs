//! Row-length breakpoints: ordinal to byte-offset translation.
//!
//! Rather than storing a per-row offset, each partition keeps the ordered
//! list of points where the serialized row length changed. The offset of row
//! ordinal `r` is the header length plus `length x run` for every run before
//! the one containing `r`, which bounds the computation to O(breakpoints).
//! Deletions overwrite in place and never change a line's length, so the
//! structure only grows on append.

/// Breakpoints for one partition. Ordinals count every line after the
/// header, whitespaced (deleted) lines included.
#[derive(Clone, Debug, Default)]
pub struct Breakpoints {
    header_len: u64,
    /// `(first_ordinal, byte_length)`, strictly increasing in ordinal.
    points: Vec<(u64, u32)>,
    /// Total number of lines recorded.
    lines: u64,
}

impl Breakpoints {
    /// Creates an empty set for a partition whose header line (newline
    /// included) is `header_len` bytes.
    pub fn new(header_len: u64) -> Self {
        Breakpoints {
            header_len,
            points: Vec::new(),
            lines: 0,
        }
    }

    /// Rebuilds from a sequential scan's line lengths.
    pub fn from_lengths(header_len: u64, lengths: impl IntoIterator<Item = u32>) -> Self {
        let mut bp = Breakpoints::new(header_len);
        for len in lengths {
            bp.record(len);
        }
        bp
    }

    /// Records the next appended line's length.
    pub fn record(&mut self, length: u32) {
        match self.points.last() {
            Some(&(_, last)) if last == length => {}
            _ => self.points.push((self.lines, length)),
        }
        self.lines += 1;
    }

    /// Number of lines recorded (live and whitespaced).
    #[inline]
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Number of breakpoints.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if no lines have been recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    /// Byte length of the line at `ordinal`, if recorded.
    pub fn length_of(&self, ordinal: u64) -> Option<u32> {
        if ordinal >= self.lines {
            return None;
        }
        let idx = match self.points.binary_search_by_key(&ordinal, |&(o, _)| o) {
            Ok(idx) => idx,
            Err(0) => return None,
            Err(idx) => idx - 1,
        };
        Some(self.points[idx].1)
    }

    /// Byte offset of the line at `ordinal`, if recorded.
    pub fn offset_of(&self, ordinal: u64) -> Option<u64> {
        if ordinal >= self.lines {
            return None;
        }
        let mut offset = self.header_len;
        for (i, &(first, length)) in self.points.iter().enumerate() {
            let run_end = self
                .points
                .get(i + 1)
                .map(|&(next, _)| next)
                .unwrap_or(self.lines);
            if ordinal < run_end {
                return Some(offset + (ordinal - first) * u64::from(length));
            }
            offset += (run_end - first) * u64::from(length);
        }
        None
    }

    /// Byte offset one past the last recorded line: the append position.
    pub fn end_offset(&self) -> u64 {
        let mut offset = self.header_len;
        for (i, &(first, length)) in self.points.iter().enumerate() {
            let run_end = self
                .points
                .get(i + 1)
                .map(|&(next, _)| next)
                .unwrap_or(self.lines);
            offset += (run_end - first) * u64::from(length);
        }
        offset
    }
}
