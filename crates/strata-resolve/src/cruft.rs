//! Cruft: graph elements invalidated by an unrecoverable fault.

use std::collections::HashSet;

use strata_core::{HyperEdgeId, NodeId};
use strata_faults::FaultSource;

/// Anything that can be marked as cruft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CruftKey {
    Node(NodeId),
    Edge(HyperEdgeId),
    Source(FaultSource),
}

/// The set of cruft marks of one layer context. Marks are never removed.
#[derive(Debug, Default)]
pub struct CruftCache {
    marked: HashSet<CruftKey>,
}

impl CruftCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: CruftKey) {
        self.marked.insert(key);
    }

    pub fn has(&self, key: CruftKey) -> bool {
        self.marked.contains(&key)
    }

    pub fn has_edge(&self, edge: HyperEdgeId) -> bool {
        self.has(CruftKey::Edge(edge))
    }

    pub fn has_node(&self, node: NodeId) -> bool {
        self.has(CruftKey::Node(node))
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }
}
