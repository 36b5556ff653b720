//! Output buffer for expect operations.
//!
//! Accumulates what the child prints. Matching runs over the longest valid
//! UTF-8 prefix, so a multi-byte character split across two reads is held
//! back until its remaining bytes arrive.

use std::collections::VecDeque;
use std::fmt;

/// Default buffer capacity (1 MB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// A bounded buffer of child output.
///
/// When the maximum size is reached the oldest bytes are discarded.
#[derive(Clone)]
pub struct OutputBuffer {
    /// The underlying storage.
    data: VecDeque<u8>,
    /// Maximum capacity.
    max_size: usize,
    /// Total bytes ever appended.
    total_written: usize,
    /// Bytes discarded due to overflow.
    bytes_discarded: usize,
}

impl OutputBuffer {
    /// Create a new buffer with the specified maximum size.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            data: VecDeque::with_capacity(max_size.min(64 * 1024)),
            max_size,
            total_written: 0,
            bytes_discarded: 0,
        }
    }

    /// Append data to the buffer.
    ///
    /// If the buffer would exceed its maximum size, oldest data is discarded
    /// up to the next character boundary. Invalid UTF-8 is replaced with
    /// U+FFFD so match positions stay byte accurate.
    pub fn append(&mut self, data: &[u8]) {
        self.total_written += data.len();

        if data.len() >= self.max_size {
            let start = data.len() - self.max_size;
            self.bytes_discarded += self.data.len() + start;
            self.data.clear();
            self.data.extend(&data[start..]);
        } else {
            self.data.extend(data);
        }
        self.discard_front(self.data.len().saturating_sub(self.max_size));

        self.sanitize();
        // Replacement characters are wider than the bytes they stand for.
        self.discard_front(self.data.len().saturating_sub(self.max_size));
    }

    /// Drop at least `count` leading bytes, never leaving a continuation
    /// byte at the front.
    fn discard_front(&mut self, count: usize) {
        let mut end = count.min(self.data.len());
        while self.data.get(end).is_some_and(|&b| is_continuation(b)) {
            end += 1;
        }
        if end > 0 {
            self.bytes_discarded += end;
            self.data.drain(..end);
        }
    }

    /// Replace invalid UTF-8 sequences, leaving an incomplete trailing
    /// sequence alone.
    fn sanitize(&mut self) {
        let bytes = self.data.make_contiguous();
        let Err(err) = std::str::from_utf8(bytes) else {
            return;
        };
        if err.error_len().is_none() {
            return;
        }
        let tail = incomplete_tail_start(bytes);
        let mut fixed = String::from_utf8_lossy(&bytes[..tail]).into_owned().into_bytes();
        fixed.extend_from_slice(&bytes[tail..]);
        self.data = fixed.into();
    }

    /// The matchable text: everything up to an incomplete trailing sequence.
    #[must_use]
    pub fn text(&mut self) -> &str {
        let bytes: &[u8] = self.data.make_contiguous();
        match std::str::from_utf8(bytes) {
            Ok(text) => text,
            // sanitize() leaves at most an incomplete tail behind
            Err(err) => std::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default(),
        }
    }

    /// Get the current buffer contents as a string (lossy UTF-8 conversion).
    #[must_use]
    pub fn as_str_lossy(&mut self) -> String {
        String::from_utf8_lossy(self.data.make_contiguous()).into_owned()
    }

    /// Remove and return the first `end` bytes.
    ///
    /// `end` must lie on a character boundary of [`OutputBuffer::text`].
    pub fn consume(&mut self, end: usize) -> String {
        let end = end.min(self.data.len());
        let drained: Vec<u8> = self.data.drain(..end).collect();
        String::from_utf8_lossy(&drained).into_owned()
    }

    /// Get the current length of the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the maximum size of the buffer.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the total bytes written to the buffer.
    #[must_use]
    pub const fn total_written(&self) -> usize {
        self.total_written
    }

    /// Get the number of bytes that have been discarded due to overflow.
    #[must_use]
    pub const fn bytes_discarded(&self) -> usize {
        self.bytes_discarded
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

const fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Start of a trailing sequence that may still be completed by the next
/// read, or `bytes.len()` if there is none.
fn incomplete_tail_start(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let start = len - back;
        if let Err(err) = std::str::from_utf8(&bytes[start..]) {
            if err.valid_up_to() == 0 && err.error_len().is_none() {
                return start;
            }
        }
        if !is_continuation(bytes[start]) {
            break;
        }
    }
    len
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("len", &self.len())
            .field("max_size", &self.max_size)
            .field("total_written", &self.total_written)
            .field("bytes_discarded", &self.bytes_discarded)
            .finish()
    }
}
