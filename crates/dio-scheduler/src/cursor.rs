//! Round-robin cursor.
//!
//! Tracks the next index to hand out from a list whose length may change
//! between selections. Not synchronized on its own; the scheduler keeps it
//! behind its state lock.

/// Index into a worker list that advances one step per selection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobinCursor {
    position: usize,
}

impl RoundRobinCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at a specific position (normalized on the next use).
    pub fn at(position: usize) -> Self {
        Self { position }
    }

    /// Return the current index and advance, wrapping at `len`.
    ///
    /// Returns `None` if `len` is zero.
    pub fn advance(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            self.position = 0;
            return None;
        }
        let idx = self.position % len;
        self.position = (idx + 1) % len;
        Some(idx)
    }

    /// Bring the position back into `[0, len)` after the list changed size.
    pub fn normalize(&mut self, len: usize) {
        self.position = if len == 0 { 0 } else { self.position % len };
    }

    /// Current position (for diagnostics).
    pub fn position(&self) -> usize {
        self.position
    }
}
