//! Monotonic version stamps.
//!
//! Every mutation of a program's documents advances the program to a freshly
//! minted [`VersionStamp`]. Caches record the stamp they were built under and
//! compare it against the current one instead of being invalidated
//! explicitly.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

/// An opaque, totally ordered generation token.
///
/// Stamps are minted from a process-wide counter, so two stamps from
/// different programs never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VersionStamp(u64);

impl VersionStamp {
    /// Mints a stamp newer than every stamp minted before it.
    pub fn next() -> Self {
        VersionStamp(NEXT_STAMP.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns `true` if this stamp was minted after `other`.
    pub fn newer_than(self, other: VersionStamp) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
