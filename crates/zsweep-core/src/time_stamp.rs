//! Modification time stamps.
//!
//! Every configuration object carries a [`TimeStamp`] that is bumped on each
//! change. Caches remember the stamp they were built from and rebuild only
//! when the source is newer.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide modification counter.
static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A point in modification time. Larger stamps are newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeStamp(u64);

impl TimeStamp {
    /// The stamp older than any modification; caches start here.
    pub const NEVER: TimeStamp = TimeStamp(0);

    /// Returns a fresh stamp, newer than every stamp handed out before.
    pub fn now() -> Self {
        Self(COUNTER.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Marks the owner as modified.
    pub fn modified(&mut self) {
        *self = Self::now();
    }

    /// Raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }
}
