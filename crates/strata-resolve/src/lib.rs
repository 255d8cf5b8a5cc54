//! Type resolution for strata programs.
//!
//! Resolution builds a shadow inheritance graph over the document graph:
//! one [`Layer`] per URI prefix, holding [`Parallel`]s that record the bases
//! each declaration resolves to. Polymorphic annotations are decided by
//! comparing where candidates exist, and same-level circular references are
//! reported as faults and excluded as cruft.
//!
//! The public surface is [`Program`] for documents, edits and faults, and
//! [`Type`] for reading resolved types.

pub mod context;
pub mod cruft;
pub mod error;
pub mod hooks;
pub mod layer;
pub mod options;
pub mod parallel;
pub mod program;
pub mod types;
pub mod worker;

pub use context::{subset_factor, LayerContext};
pub use cruft::{CruftCache, CruftKey};
pub use error::ResolveError;
pub use hooks::{HookEvent, Hooks};
pub use layer::{Layer, LayerId};
pub use options::ProgramOptions;
pub use parallel::{Parallel, ParallelId, SpecifiedParallel, UnspecifiedParallel};
pub use program::Program;
pub use types::cache::{Cached, TypeCache, TypeRegistry};
pub use types::proxy::{TypeProxy, TypeProxyArray};
pub use types::{Type, TypeList, Visit};
pub use worker::ConstructionWorker;
