//! Core value types and the in-memory document graph for strata.
//!
//! The resolution engine in `strata-resolve` never mutates anything defined
//! here. Documents are edited through [`Document::apply`], after which a
//! fresh [`DocumentGraph`] is built from scratch; every graph is immutable
//! for the lifetime of the [`VersionStamp`] it was built under.

pub mod document;
pub mod error;
pub mod graph;
pub mod id;
pub mod statement;
pub mod uri;
pub mod version;

// Re-export commonly used types
pub use document::{Document, DocumentEdit, DocumentEditor, StatementIds};
pub use error::CoreError;
pub use graph::{
    DocumentEntry, DocumentGraph, GraphBuild, GraphFault, GraphFaultKind, HyperEdge, Node,
    StatementLocation, Successor,
};
pub use id::{DocumentId, HyperEdgeId, NodeId, StatementId};
pub use statement::{PatternSubject, SpanRef, Statement, StatementKind, Subject};
pub use uri::{Uri, UriProtocol};
pub use version::VersionStamp;
