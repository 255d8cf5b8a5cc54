//! Parallels: the nodes of the shadow inheritance graph.
//!
//! A [`Parallel`] exists per `(node or absence, containing URI)` pair inside
//! one layer context. A [`SpecifiedParallel`] wraps a declared node and
//! records the bases it resolved to, one per hyperedge. An
//! [`UnspecifiedParallel`] stands where no node is declared but the position
//! is implied by the parallels of the container.
//!
//! Parallels are stored in an arena owned by the layer context and refer to
//! each other by [`ParallelId`].

use std::fmt;

use indexmap::IndexMap;
use strata_core::{HyperEdgeId, NodeId, Uri};

use crate::cruft::CruftCache;
use crate::error::ResolveError;

/// Index of a parallel in its layer context's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParallelId(pub u32);

impl fmt::Display for ParallelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parallel backed by a declared node.
#[derive(Debug, Clone)]
pub struct SpecifiedParallel {
    pub id: ParallelId,
    pub uri: Uri,
    pub container: Option<ParallelId>,
    pub node: NodeId,
    pub parallels: Vec<ParallelId>,
    bases: IndexMap<HyperEdgeId, ParallelId>,
}

impl SpecifiedParallel {
    pub fn new(
        id: ParallelId,
        uri: Uri,
        container: Option<ParallelId>,
        node: NodeId,
        parallels: Vec<ParallelId>,
    ) -> Self {
        SpecifiedParallel {
            id,
            uri,
            container,
            node,
            parallels,
            bases: IndexMap::new(),
        }
    }

    /// Registers `base` as the resolution of `via`. An edge resolves to at
    /// most one base.
    pub fn add_base(&mut self, base: ParallelId, via: HyperEdgeId) -> Result<(), ResolveError> {
        if self.bases.contains_key(&via) {
            return Err(ResolveError::DuplicateBase { edge: via });
        }
        self.bases.insert(via, base);
        Ok(())
    }

    /// Returns the registered bases whose edges are not cruft.
    pub fn bases(&self, cruft: &CruftCache) -> Vec<ParallelId> {
        self.each_base(cruft).map(|(_, base)| base).collect()
    }

    /// Iterates `(edge, base)` pairs whose edges are not cruft.
    pub fn each_base<'a>(
        &'a self,
        cruft: &'a CruftCache,
    ) -> impl Iterator<Item = (HyperEdgeId, ParallelId)> + 'a {
        self.bases
            .iter()
            .filter(|(edge, _)| !cruft.has_edge(**edge))
            .map(|(edge, base)| (*edge, *base))
    }

    /// Returns `true` if any base was ever registered, cruft or not.
    pub fn has_bases(&self) -> bool {
        !self.bases.is_empty()
    }
}

/// A parallel inferred from the parallels of its container.
#[derive(Debug, Clone)]
pub struct UnspecifiedParallel {
    pub id: ParallelId,
    pub uri: Uri,
    pub container: Option<ParallelId>,
    pub parallels: Vec<ParallelId>,
}

/// A node of the shadow graph.
#[derive(Debug, Clone)]
pub enum Parallel {
    Specified(SpecifiedParallel),
    Unspecified(UnspecifiedParallel),
}

impl Parallel {
    pub fn id(&self) -> ParallelId {
        match self {
            Parallel::Specified(p) => p.id,
            Parallel::Unspecified(p) => p.id,
        }
    }

    pub fn uri(&self) -> &Uri {
        match self {
            Parallel::Specified(p) => &p.uri,
            Parallel::Unspecified(p) => &p.uri,
        }
    }

    pub fn container(&self) -> Option<ParallelId> {
        match self {
            Parallel::Specified(p) => p.container,
            Parallel::Unspecified(p) => p.container,
        }
    }

    /// The parallels this one overrides or is inferred from.
    pub fn parallels(&self) -> &[ParallelId] {
        match self {
            Parallel::Specified(p) => &p.parallels,
            Parallel::Unspecified(p) => &p.parallels,
        }
    }

    pub fn as_specified(&self) -> Option<&SpecifiedParallel> {
        match self {
            Parallel::Specified(p) => Some(p),
            Parallel::Unspecified(_) => None,
        }
    }

    pub fn as_specified_mut(&mut self) -> Option<&mut SpecifiedParallel> {
        match self {
            Parallel::Specified(p) => Some(p),
            Parallel::Unspecified(_) => None,
        }
    }

    pub fn is_specified(&self) -> bool {
        matches!(self, Parallel::Specified(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cruft::CruftKey;

    fn specified() -> SpecifiedParallel {
        SpecifiedParallel::new(
            ParallelId(0),
            Uri::parse("memory://a.strata#A").unwrap(),
            None,
            NodeId(0),
            Vec::new(),
        )
    }

    #[test]
    fn an_edge_resolves_to_one_base() {
        let mut p = specified();
        p.add_base(ParallelId(1), HyperEdgeId(0)).unwrap();
        assert_eq!(
            p.add_base(ParallelId(2), HyperEdgeId(0)),
            Err(ResolveError::DuplicateBase {
                edge: HyperEdgeId(0)
            })
        );
        assert_eq!(p.bases(&CruftCache::new()), vec![ParallelId(1)]);
    }

    #[test]
    fn cruft_bases_are_filtered_at_read_time() {
        let mut p = specified();
        p.add_base(ParallelId(1), HyperEdgeId(0)).unwrap();
        p.add_base(ParallelId(2), HyperEdgeId(1)).unwrap();

        let mut cruft = CruftCache::new();
        assert_eq!(p.bases(&cruft), vec![ParallelId(1), ParallelId(2)]);

        cruft.add(CruftKey::Edge(HyperEdgeId(0)));
        assert_eq!(p.bases(&cruft), vec![ParallelId(2)]);
        assert!(p.has_bases());
    }
}
