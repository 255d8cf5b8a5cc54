//! Fault frames: sets of faults keyed by source and kind.

use std::collections::HashSet;

use indexmap::IndexMap;
use strata_core::StatementId;

use crate::fault::{Fault, FaultSource};
use crate::kind::FaultKind;

/// A set of faults, grouped by source.
///
/// At most one fault of each kind is held per source. Insertion order is
/// preserved so that broadcasts are deterministic.
#[derive(Debug, Clone, Default)]
pub struct FaultFrame {
    faults: IndexMap<FaultSource, IndexMap<FaultKind, Fault>>,
}

impl FaultFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fault. Returns `true` if no fault of the same source and
    /// kind was present; otherwise the held fault's location is refreshed.
    pub fn insert(&mut self, fault: Fault) -> bool {
        self.faults
            .entry(fault.source)
            .or_default()
            .insert(fault.kind, fault)
            .is_none()
    }

    /// Removes the fault with the same source and kind as `fault`.
    pub fn remove(&mut self, fault: &Fault) -> Option<Fault> {
        let kinds = self.faults.get_mut(&fault.source)?;
        let removed = kinds.shift_remove(&fault.kind);
        if kinds.is_empty() {
            self.faults.shift_remove(&fault.source);
        }
        removed
    }

    pub fn contains(&self, fault: &Fault) -> bool {
        self.get(fault.source, fault.kind).is_some()
    }

    pub fn get(&self, source: FaultSource, kind: FaultKind) -> Option<&Fault> {
        self.faults.get(&source)?.get(&kind)
    }

    /// Returns the faults attached to `source`.
    pub fn check(&self, source: FaultSource) -> impl Iterator<Item = &Fault> {
        self.faults.get(&source).into_iter().flat_map(|k| k.values())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fault> {
        self.faults.values().flat_map(|k| k.values())
    }

    /// Number of faults held, across all sources.
    pub fn len(&self) -> usize {
        self.faults.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// Collects the faults whose source lies in one of `statements`.
    pub fn collect_within(&self, statements: &HashSet<StatementId>) -> FaultFrame {
        let mut out = FaultFrame::new();
        for fault in self.iter() {
            if statements.contains(&fault.source.statement()) {
                out.insert(fault.clone());
            }
        }
        out
    }

    /// Removes every fault held by `other`.
    pub fn subtract(&mut self, other: &FaultFrame) {
        for fault in other.iter() {
            self.remove(fault);
        }
    }

    /// Inserts every fault held by `other`.
    pub fn merge(&mut self, other: &FaultFrame) {
        for fault in other.iter() {
            self.insert(fault.clone());
        }
    }
}

impl<'a> IntoIterator for &'a FaultFrame {
    type Item = &'a Fault;
    type IntoIter = Box<dyn Iterator<Item = &'a Fault> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// The working state of one edit transaction.
#[derive(Debug, Clone, Default)]
pub struct FaultFrameContext {
    /// Statements whose committed faults must be re-established.
    pub invalidated: HashSet<StatementId>,
    /// Faults reported during the transaction.
    pub accumulated: FaultFrame,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{DocumentId, SpanRef};

    fn fault(kind: FaultKind, stmt: u32) -> Fault {
        Fault::new(
            kind,
            FaultSource::Statement(StatementId(stmt)),
            DocumentId(0),
            stmt,
        )
    }

    #[test]
    fn one_fault_per_source_and_kind() {
        let mut frame = FaultFrame::new();
        assert!(frame.insert(fault(FaultKind::InvalidPattern, 1)));
        assert!(!frame.insert(fault(FaultKind::InvalidPattern, 1)));
        assert!(frame.insert(fault(FaultKind::UnresolvedResource, 1)));
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.check(FaultSource::Statement(StatementId(1))).count(), 2);
    }

    #[test]
    fn remove_drops_empty_sources() {
        let mut frame = FaultFrame::new();
        let f = fault(FaultKind::InvalidPattern, 1);
        frame.insert(f.clone());
        assert_eq!(frame.remove(&f), Some(f.clone()));
        assert!(frame.is_empty());
        assert_eq!(frame.remove(&f), None);
    }

    #[test]
    fn collect_within_matches_span_statements() {
        let mut frame = FaultFrame::new();
        let span = Fault::new(
            FaultKind::UnresolvedAnnotation,
            FaultSource::Span(SpanRef {
                statement: StatementId(7),
                index: 0,
            }),
            DocumentId(0),
            7,
        );
        frame.insert(span.clone());
        frame.insert(fault(FaultKind::InvalidPattern, 3));

        let within = frame.collect_within(&HashSet::from([StatementId(7)]));
        assert_eq!(within.iter().collect::<Vec<_>>(), vec![&span]);

        frame.subtract(&within);
        assert_eq!(frame.len(), 1);
    }
}
