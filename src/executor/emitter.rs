/// Result emission
///
/// - `SharedEmitter`: one output stream shared by many threads; each call
///   writes whole lines under a single lock so lines never interleave.
/// - `OutputBuffer`: private staging area for one query's matches on one
///   distributed participant, flushed during that participant's turn.

use crate::types::QueryError;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Initial capacity of an `OutputBuffer` once it receives data
const INITIAL_BUFFER_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct SharedEmitter<W> {
    sink: Mutex<W>,
}

impl<W: Write> SharedEmitter<W> {
    pub const fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Write `bytes` as one uninterrupted block
    pub fn emit(&self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        sink.write_all(bytes)
    }

    pub fn emit_line(&self, line: &str) -> io::Result<()> {
        self.emit(line.as_bytes())
    }

    pub fn flush(&self) -> io::Result<()> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }

    pub fn into_inner(self) -> W {
        self.sink.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Growable byte buffer with fallible, doubling growth
#[derive(Debug, Default)]
pub struct OutputBuffer {
    data: Vec<u8>,
}

impl OutputBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Append `bytes`, reporting `OutOfMemory` instead of aborting on allocation failure
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), QueryError> {
        let needed = self.data.len() + bytes.len();
        if needed > self.data.capacity() {
            let mut new_cap = self.data.capacity().max(INITIAL_BUFFER_CAPACITY);
            while new_cap < needed {
                new_cap = new_cap.saturating_mul(2);
            }
            self.data.try_reserve_exact(new_cap - self.data.len())?;
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
