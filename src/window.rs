//! Bounded sliding window over a sequential input source
//!
//! The extraction stage consumes input in bounded chunks, and a unit boundary
//! can land anywhere, including across a chunk edge. [`ChunkReader`] keeps a
//! fixed-capacity window where the unconsumed tail of the previous cycle is
//! shifted to the front before fresh bytes are appended, so a split unit is
//! never lost. Consumption offsets come back from the extraction stage one
//! cycle later, which is why [`ChunkReader::fill`] takes the *previous*
//! cycle's boundary.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

/// Default window capacity, 1 MiB (matches typical extraction chunk sizing)
pub const DEFAULT_WINDOW_CAPACITY: usize = 1 << 20;

/// Double-buffered bounded reader with an unconsumed-tail carry-over
pub struct ChunkReader<R> {
    source: R,
    buf: Vec<u8>,
    len: usize,
    capacity: usize,
    total_read: u64,
    eof: bool,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Wrap `source` with a window of `capacity` bytes
    pub fn new(source: R, capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be non-zero");
        Self {
            source,
            buf: vec![0u8; capacity],
            len: 0,
            capacity,
            total_read: 0,
            eof: false,
        }
    }

    /// Wrap `source` with the default window capacity
    pub fn with_default_capacity(source: R) -> Self {
        Self::new(source, DEFAULT_WINDOW_CAPACITY)
    }

    /// Advance the window by one cycle
    ///
    /// `consumed_boundary` is the offset within the previous window up to
    /// which the prior cycle reported genuine consumption (clamped to the
    /// window length). The tail beyond it is shifted to the front, then the
    /// window is refilled from the source up to capacity. Short reads at
    /// end-of-input shrink the effective window. Returns the number of fresh
    /// bytes appended.
    pub async fn fill(&mut self, consumed_boundary: usize) -> Result<usize> {
        let boundary = consumed_boundary.min(self.len);
        let tail = self.len - boundary;
        self.buf.copy_within(boundary..self.len, 0);
        self.len = tail;

        let mut added = 0;
        while self.len < self.capacity {
            let n = self.source.read(&mut self.buf[self.len..self.capacity]).await?;
            if n == 0 {
                self.eof = true;
                break;
            }
            self.len += n;
            added += n;
        }
        self.total_read += added as u64;
        tracing::trace!(added, window_len = self.len, total_read = self.total_read, "window refilled");
        Ok(added)
    }

    /// The effective window contents
    pub fn window(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Cumulative bytes read from the source
    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    /// Whether the source has reported end-of-input
    pub fn at_eof(&self) -> bool {
        self.eof
    }
}
