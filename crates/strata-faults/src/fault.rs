//! Faults and the sources they attach to.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_core::{DocumentId, GraphFault, SpanRef, StatementId};

use crate::kind::FaultKind;

/// What a fault is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FaultSource {
    /// A whole statement.
    Statement(StatementId),
    /// One annotation of a statement.
    Span(SpanRef),
}

impl FaultSource {
    /// Returns the statement the source lives in.
    pub fn statement(self) -> StatementId {
        match self {
            FaultSource::Statement(id) => id,
            FaultSource::Span(span) => span.statement,
        }
    }
}

/// A user-facing fault.
///
/// Identity is `(source, kind)`. The location is captured at report time and
/// refreshed whenever the fault is re-reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub source: FaultSource,
    pub document: DocumentId,
    /// Zero-based line of the source statement.
    pub line: u32,
}

impl Fault {
    pub fn new(kind: FaultKind, source: FaultSource, document: DocumentId, line: u32) -> Self {
        Fault {
            kind,
            source,
            document,
            line,
        }
    }

    /// Returns `true` if both faults have the same source and kind.
    pub fn same_as(&self, other: &Fault) -> bool {
        self.source == other.source && self.kind == other.kind
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at document {} line {}",
            self.kind,
            self.document,
            self.line + 1
        )
    }
}

impl From<&GraphFault> for Fault {
    fn from(fault: &GraphFault) -> Self {
        let source = match fault.span {
            Some(index) => FaultSource::Span(SpanRef {
                statement: fault.statement,
                index,
            }),
            None => FaultSource::Statement(fault.statement),
        };
        Fault::new(fault.kind.into(), source, fault.document, fault.line)
    }
}
