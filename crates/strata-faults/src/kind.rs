//! Fault kinds, their numeric codes and scoping.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_core::GraphFaultKind;

/// The kinds of user-facing faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// A document reference names no loaded document.
    UnresolvedResource,
    /// A document reference closes a cycle of references.
    CircularResourceReference,
    /// A pattern declaration does not compile.
    InvalidPattern,
    /// An annotation names no declaration and matches no pattern.
    UnresolvedAnnotation,
    /// A base edge takes part in an inheritance cycle.
    CircularTypeReference,
}

impl FaultKind {
    /// Stable numeric code, unique per kind.
    pub fn code(self) -> u16 {
        match self {
            FaultKind::UnresolvedResource => 100,
            FaultKind::CircularResourceReference => 102,
            FaultKind::UnresolvedAnnotation => 201,
            FaultKind::CircularTypeReference => 203,
            FaultKind::InvalidPattern => 300,
        }
    }

    /// Returns `true` for kinds whose truth depends on declarations outside
    /// the faulted statement. Faults of these kinds are re-verified on every
    /// edit.
    pub fn is_global(self) -> bool {
        !matches!(self, FaultKind::InvalidPattern)
    }

    pub fn message(self) -> &'static str {
        match self {
            FaultKind::UnresolvedResource => "unresolved resource",
            FaultKind::CircularResourceReference => "circular resource reference",
            FaultKind::InvalidPattern => "invalid pattern",
            FaultKind::UnresolvedAnnotation => "unresolved annotation",
            FaultKind::CircularTypeReference => "circular type reference",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

impl From<GraphFaultKind> for FaultKind {
    fn from(kind: GraphFaultKind) -> Self {
        match kind {
            GraphFaultKind::UnresolvedResource => FaultKind::UnresolvedResource,
            GraphFaultKind::CircularResourceReference => FaultKind::CircularResourceReference,
            GraphFaultKind::InvalidPattern => FaultKind::InvalidPattern,
            GraphFaultKind::UnresolvedAnnotation => FaultKind::UnresolvedAnnotation,
        }
    }
}
