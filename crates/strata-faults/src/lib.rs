//! Fault tracking for strata programs.
//!
//! Faults are user-facing and recoverable. They are reported through a
//! [`FaultSink`], collected by a [`FaultService`] and broadcast as
//! [`FaultEvent`]s only when the committed set actually changes.

pub mod fault;
pub mod frame;
pub mod kind;
pub mod service;
pub mod sink;

pub use fault::{Fault, FaultSource};
pub use frame::{FaultFrame, FaultFrameContext};
pub use kind::FaultKind;
pub use service::{FaultEvent, FaultService};
pub use sink::FaultSink;
