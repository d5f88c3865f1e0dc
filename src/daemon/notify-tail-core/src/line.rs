//! Line reassembly
//!
//! Converts a stream of raw byte reads into discrete `\n`-delimited lines.
//! The buffer has a fixed capacity; a line that fills it without a delimiter
//! is force-emitted so that memory stays bounded.

use crate::DEFAULT_LINE_BUFFER_SIZE;

/// Smallest usable capacity: one byte of data plus the reserved slot.
const MIN_CAPACITY: usize = 2;

/// How an assembled line was terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnd {
    /// A `\n` delimiter was found
    Newline,
    /// The buffer filled up before any delimiter appeared
    ForcedSplit,
}

/// One complete line produced by the assembler (delimiter stripped)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledLine {
    pub bytes: Vec<u8>,
    pub end: LineEnd,
}

impl AssembledLine {
    pub fn is_forced(&self) -> bool {
        self.end == LineEnd::ForcedSplit
    }
}

/// Fixed-capacity line buffer with a write cursor.
///
/// Reads go straight into [`LineAssembler::spare_mut`] and are committed with
/// [`LineAssembler::commit`]. One slot is always held back, so the longest
/// line that can be emitted in one piece is `capacity - 1` bytes.
#[derive(Debug, Clone)]
pub struct LineAssembler {
    data: Box<[u8]>,
    pos: usize,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LINE_BUFFER_SIZE)
    }

    /// Capacities below 2 are raised to 2.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes of the unterminated line currently held
    pub fn pending(&self) -> &[u8] {
        &self.data[..self.pos]
    }

    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Drop any partial line.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Writable region after the cursor. Never empty between commits.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let limit = self.limit();
        &mut self.data[self.pos..limit]
    }

    /// Account for `n` bytes written into [`spare_mut`](Self::spare_mut) and
    /// extract every line that is now complete.
    pub fn commit(&mut self, n: usize) -> Vec<AssembledLine> {
        let n = n.min(self.limit() - self.pos);
        self.pos += n;
        self.extract()
    }

    /// Append `bytes`, splitting them across as many buffer fills as needed.
    pub fn feed(&mut self, mut bytes: &[u8]) -> Vec<AssembledLine> {
        let mut lines = Vec::new();
        while !bytes.is_empty() {
            let spare = self.spare_mut();
            let n = spare.len().min(bytes.len());
            spare[..n].copy_from_slice(&bytes[..n]);
            bytes = &bytes[n..];
            lines.extend(self.commit(n));
        }
        lines
    }

    fn limit(&self) -> usize {
        self.data.len() - 1
    }

    fn extract(&mut self) -> Vec<AssembledLine> {
        let mut lines = Vec::new();
        let mut start = 0;

        while let Some(offset) = self.data[start..self.pos].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(AssembledLine {
                bytes: self.data[start..end].to_vec(),
                end: LineEnd::Newline,
            });
            start = end + 1;
        }

        if start > 0 {
            self.data.copy_within(start..self.pos, 0);
            self.pos -= start;
        }

        if self.pos >= self.limit() {
            lines.push(AssembledLine {
                bytes: self.data[..self.pos].to_vec(),
                end: LineEnd::ForcedSplit,
            });
            self.pos = 0;
        }

        lines
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}
