//! Bounded history log for late-joiner replay
//!
//! A client joining mid-session reconstructs the canvas by replaying every
//! stored event in acceptance order. The log is bounded: once full, the
//! oldest entry is evicted first, strict FIFO, never reordered.

use std::collections::VecDeque;

use bytes::Bytes;

/// Append-only bounded log of encoded frames
#[derive(Debug)]
pub struct HistoryLog {
    max_entries: usize,
    entries: VecDeque<Bytes>,
}

impl HistoryLog {
    /// Create a log bounded to `max_entries`
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: VecDeque::new(),
        }
    }

    /// Append a frame, evicting from the front to keep the bound
    pub fn push(&mut self, frame: Bytes) {
        if self.max_entries == 0 {
            return;
        }
        while self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(frame);
    }

    /// Point-in-time copy of the log, oldest first
    ///
    /// Frames are `Bytes`, so the copy shares payload allocations.
    pub fn snapshot(&self) -> Vec<Bytes> {
        self.entries.iter().cloned().collect()
    }

    /// Iterate entries in order without copying
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.entries.iter()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
