//! The reporting seam between resolution and the fault engine.

use crate::fault::Fault;

/// Receives faults discovered during resolution.
///
/// Resolution only holds a shared reference to its sink, so implementors
/// provide their own interior mutability.
pub trait FaultSink {
    fn report(&self, fault: Fault);
}
