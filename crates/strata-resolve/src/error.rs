//! Error types for strata-resolve.
//!
//! Every variant is a state error: an invariant violation that aborts the
//! current operation. User-facing problems are faults, reported through
//! `strata_faults`, and never surface here.

use strata_core::{CoreError, DocumentId, HyperEdgeId};
use thiserror::Error;

/// Errors produced by resolution and program operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A type built under an older program version was read.
    #[error("type is dirty: '{uri}' was built before the latest edit")]
    Dirty { uri: String },

    /// A base was registered twice for the same hyperedge.
    #[error("duplicate base for edge {edge}")]
    DuplicateBase { edge: HyperEdgeId },

    /// Construction reached a branch that a consistent graph never produces.
    #[error("unknown state: {reason}")]
    UnknownState { reason: String },

    /// The program owning a type or proxy no longer exists.
    #[error("program dropped")]
    ProgramDropped,

    /// A layer was requested for a URI without type components.
    #[error("uri has no type path")]
    EmptyTypePath,

    /// A document with the same URI is already loaded.
    #[error("document already exists: '{uri}'")]
    DocumentExists { uri: String },

    /// A document ID was not found in the program.
    #[error("document not found: DocumentId({id})", id = id.0)]
    DocumentNotFound { id: DocumentId },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ResolveError {
    pub(crate) fn unknown_state(reason: impl Into<String>) -> Self {
        ResolveError::UnknownState {
            reason: reason.into(),
        }
    }
}
