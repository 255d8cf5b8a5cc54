//! Core error types for strata-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of URI parsing and document editing.

use thiserror::Error;

use crate::id::DocumentId;

/// Core errors produced by the strata-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The text could not be read as a URI.
    #[error("invalid uri: '{text}'")]
    InvalidUri { text: String },

    /// An edit addressed a line past the end of the document.
    #[error("line {line} out of range (document has {len} statements)")]
    LineOutOfRange { line: usize, len: usize },

    /// A document ID was not found.
    #[error("document not found: DocumentId({id})", id = id.0)]
    DocumentNotFound { id: DocumentId },
}
