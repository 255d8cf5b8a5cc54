//! LayerContext: builds layers and parallels for one program version.
//!
//! A context owns the layer cache (URI text to layer), the parallel arena,
//! the cruft set and the memo of polymorphic decisions. Everything it holds
//! is insert-once: layers are cached before they are built, cruft marks are
//! never removed, and a polymorphic edge is decided at most once. A context
//! is discarded when the program version advances.

use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use strata_core::{DocumentGraph, HyperEdge, HyperEdgeId, NodeId, Successor, Uri};
use strata_faults::{Fault, FaultKind, FaultSink, FaultSource};

use crate::cruft::{CruftCache, CruftKey};
use crate::error::ResolveError;
use crate::layer::{Layer, LayerId};
use crate::parallel::{Parallel, ParallelId, SpecifiedParallel, UnspecifiedParallel};

/// Similarity of two existence sets: the share of `src` found in `dst`.
///
/// A `dst` containing all of `src` scores 1. An empty `src` scores 0.
pub fn subset_factor(src: &HashSet<String>, dst: &HashSet<String>) -> f64 {
    if src.is_empty() {
        return 0.0;
    }
    let shared = src.iter().filter(|s| dst.contains(*s)).count();
    shared as f64 / src.len() as f64
}

/// State of one `resolve_successors` walk.
#[derive(Default)]
struct SuccessorWalk {
    cycles: Vec<Vec<HyperEdgeId>>,
    active: HashSet<HyperEdgeId>,
    done: HashSet<HyperEdgeId>,
}

pub struct LayerContext {
    graph: Rc<DocumentGraph>,
    sink: Weak<dyn FaultSink>,
    max_depth: usize,
    layers: HashMap<String, Option<LayerId>>,
    layer_arena: Vec<Layer>,
    parallels: Vec<Parallel>,
    cruft: CruftCache,
    selected: HashMap<HyperEdgeId, Successor>,
}

impl LayerContext {
    pub fn new(graph: Rc<DocumentGraph>, sink: Weak<dyn FaultSink>, max_depth: usize) -> Self {
        LayerContext {
            graph,
            sink,
            max_depth,
            layers: HashMap::new(),
            layer_arena: Vec::new(),
            parallels: Vec::new(),
            cruft: CruftCache::new(),
            selected: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &Rc<DocumentGraph> {
        &self.graph
    }

    pub fn cruft(&self) -> &CruftCache {
        &self.cruft
    }

    /// # Panics
    ///
    /// Panics if `id` was not allocated by this context.
    pub fn layer(&self, id: LayerId) -> &Layer {
        &self.layer_arena[id.0 as usize]
    }

    /// # Panics
    ///
    /// Panics if `id` was not allocated by this context.
    pub fn parallel(&self, id: ParallelId) -> &Parallel {
        &self.parallels[id.0 as usize]
    }

    pub fn layer_count(&self) -> usize {
        self.layer_arena.len()
    }

    /// Returns the memoized choice for a polymorphic edge.
    pub fn selected(&self, edge: HyperEdgeId) -> Option<Successor> {
        self.selected.get(&edge).copied()
    }

    /// Returns the chain of containers of `parallel`, outermost first and
    /// ending with `parallel` itself.
    pub fn lineage(&self, parallel: ParallelId) -> Vec<ParallelId> {
        let mut out = vec![parallel];
        let mut current = self.parallel(parallel).container();
        while let Some(id) = current {
            out.push(id);
            current = self.parallel(id).container();
        }
        out.reverse();
        out
    }

    /// Returns the URIs of the bases of `parallel`. For an unspecified
    /// parallel this is the union over every specified parallel reachable
    /// through its parallels, first-seen order.
    pub fn base_uris(&self, parallel: ParallelId) -> Vec<Uri> {
        let mut out: IndexSet<Uri> = IndexSet::new();
        for sp in self.specified_constituents(parallel) {
            for base in sp.bases(&self.cruft) {
                out.insert(self.parallel(base).uri().clone());
            }
        }
        out.into_iter().collect()
    }

    /// Returns the identifiers of the aliased edges among the bases of
    /// `parallel`, gathered the same way as [`LayerContext::base_uris`].
    pub fn aliases(&self, parallel: ParallelId) -> Vec<String> {
        let mut out = Vec::new();
        for sp in self.specified_constituents(parallel) {
            for (edge, _) in sp.each_base(&self.cruft) {
                let hyper = self.graph.edge(edge);
                if hyper.aliased {
                    out.push(hyper.identifier.clone());
                }
            }
        }
        out
    }

    /// `parallel` itself when specified, otherwise the specified parallels
    /// reached breadth-first through unspecified ones.
    fn specified_constituents(&self, parallel: ParallelId) -> Vec<&SpecifiedParallel> {
        let mut out = Vec::new();
        let mut seen: HashSet<ParallelId> = HashSet::new();
        let mut queue: VecDeque<ParallelId> = VecDeque::from([parallel]);

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            match self.parallel(id) {
                Parallel::Specified(sp) => out.push(sp),
                Parallel::Unspecified(up) => queue.extend(up.parallels.iter().copied()),
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Layer construction
    // ------------------------------------------------------------------

    /// Returns the layer for the full type path of `directive`, building
    /// every missing prefix on the way. Returns `None` when nothing exists
    /// at that URI.
    pub fn maybe_construct(&mut self, directive: &Uri) -> Result<Option<LayerId>, ResolveError> {
        let depth = directive.depth();
        if depth == 0 {
            return Err(ResolveError::EmptyTypePath);
        }
        if depth > self.max_depth {
            tracing::debug!(uri = %directive, max = self.max_depth, "type path too deep");
            return Ok(None);
        }

        if let Some(&cached) = self.layers.get(&directive.to_string()) {
            tracing::trace!(uri = %directive, "layer cache hit");
            return Ok(cached.filter(|l| self.layer(*l).seed.is_some()));
        }

        let mut last: Option<LayerId> = None;
        for i in 1..=depth {
            let uri = directive.retract_type_to(i);
            let layer = match self.layers.get(&uri.to_string()).copied() {
                Some(cached) => cached,
                None => match last {
                    None => {
                        let Some(genesis) = self.graph.read(&uri) else {
                            self.layers.insert(uri.to_string(), None);
                            return Ok(None);
                        };
                        let layer = self.register_layer(uri, None);
                        self.bootstrap(layer, genesis)?;
                        Some(layer)
                    }
                    Some(parent) => {
                        let name = directive.types()[i - 1].clone();
                        Some(self.descend(parent, &name)?)
                    }
                },
            };

            match layer {
                Some(l) if self.layer(l).seed.is_some() => last = Some(l),
                _ => return Ok(None),
            }
        }
        Ok(last)
    }

    /// Returns the seed parallel of the layer at `node`'s URI.
    pub fn get_parallel_of(&mut self, node: NodeId) -> Result<Option<ParallelId>, ResolveError> {
        if self.cruft.has_node(node) {
            return Ok(None);
        }
        let uri = self.graph.node(node).uri.clone();
        let layer = self.maybe_construct(&uri)?;
        Ok(layer.and_then(|l| self.layer(l).seed))
    }

    fn register_layer(&mut self, uri: Uri, container: Option<LayerId>) -> LayerId {
        let id = LayerId(self.layer_arena.len() as u32);
        self.layers.insert(uri.to_string(), Some(id));
        self.layer_arena.push(Layer {
            id,
            uri,
            container,
            seed: None,
        });
        id
    }

    fn next_parallel_id(&self) -> ParallelId {
        ParallelId(self.parallels.len() as u32)
    }

    fn bootstrap(&mut self, layer: LayerId, genesis: NodeId) -> Result<(), ResolveError> {
        let id = self.next_parallel_id();
        let uri = self.layer(layer).uri.clone();
        self.parallels.push(Parallel::Specified(SpecifiedParallel::new(
            id,
            uri,
            None,
            genesis,
            Vec::new(),
        )));
        self.layer_arena[layer.0 as usize].seed = Some(id);
        tracing::debug!(uri = %self.layer(layer).uri, parallel = %id, "layer bootstrapped");
        self.rake(id)
    }

    /// Builds the layer one type component below `parent`.
    fn descend(&mut self, parent: LayerId, name: &str) -> Result<LayerId, ResolveError> {
        let parent_layer = self.layer(parent);
        let uri = parent_layer.uri.extend_type(name);
        let parent_seed = parent_layer
            .seed
            .ok_or_else(|| ResolveError::unknown_state("descending from an empty layer"))?;
        let layer = self.register_layer(uri.clone(), Some(parent));

        let (node, sources) = match self.parallel(parent_seed) {
            Parallel::Specified(sp) => {
                let node = self.graph.node(sp.node).contents.get(name).copied();
                let mut sources = sp.parallels.clone();
                sources.extend(sp.bases(&self.cruft));
                (node, sources)
            }
            Parallel::Unspecified(up) => (None, up.parallels.clone()),
        };
        let node = node.filter(|n| !self.cruft.has_node(*n));

        let mut parallels: Vec<ParallelId> = Vec::new();
        for source in sources {
            let child = self.parallel(source).uri().extend_type(name);
            if let Some(found) = self.maybe_construct(&child)? {
                if let Some(seed) = self.layer(found).seed {
                    if !parallels.contains(&seed) {
                        parallels.push(seed);
                    }
                }
            }
        }

        let id = self.next_parallel_id();
        let seed = match node {
            Some(node) => {
                self.parallels.push(Parallel::Specified(SpecifiedParallel::new(
                    id,
                    uri,
                    Some(parent_seed),
                    node,
                    parallels,
                )));
                Some(id)
            }
            None if !parallels.is_empty() => {
                self.parallels
                    .push(Parallel::Unspecified(UnspecifiedParallel {
                        id,
                        uri,
                        container: Some(parent_seed),
                        parallels,
                    }));
                Some(id)
            }
            None => None,
        };
        self.layer_arena[layer.0 as usize].seed = seed;

        if let Some(id) = seed {
            tracing::debug!(
                uri = %self.parallel(id).uri(),
                specified = self.parallel(id).is_specified(),
                parallels = self.parallel(id).parallels().len(),
                "layer descended"
            );
            if self.parallel(id).is_specified() {
                self.rake(id)?;
            }
        }
        Ok(layer)
    }

    /// Resolves the successors of a specified parallel and registers the
    /// resulting bases.
    fn rake(&mut self, parallel: ParallelId) -> Result<(), ResolveError> {
        self.resolve_successors(parallel)?;

        let node = self
            .parallel(parallel)
            .as_specified()
            .map(|sp| sp.node)
            .ok_or_else(|| ResolveError::unknown_state("raking an unspecified parallel"))?;
        let outbounds = self.graph.node(node).outbounds.clone();

        for edge in outbounds {
            let Some(successor) = self.pick_successor(edge) else {
                continue;
            };
            let Some(base) = self.get_parallel_of(successor.node)? else {
                continue;
            };
            if !self.parallel(base).is_specified() {
                return Err(ResolveError::unknown_state(format!(
                    "base of edge {edge} is unspecified"
                )));
            }
            self.parallels[parallel.0 as usize]
                .as_specified_mut()
                .ok_or_else(|| ResolveError::unknown_state("raking an unspecified parallel"))?
                .add_base(base, edge)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Successor resolution
    // ------------------------------------------------------------------

    /// Returns the successor of `edge` that resolution settled on, or `None`
    /// when the edge, its predecessor or its target is cruft, the edge has
    /// no successors, or a polymorphic edge is undecided.
    pub fn pick_successor(&self, edge: HyperEdgeId) -> Option<Successor> {
        if self.cruft.has_edge(edge) {
            return None;
        }
        let hyper = self.graph.edge(edge);
        if self.cruft.has_node(hyper.predecessor) {
            return None;
        }

        match hyper.successors.len() {
            0 => None,
            1 => {
                let successor = hyper.successors[0];
                (!self.cruft.has_node(successor.node)).then_some(successor)
            }
            // A list and its intrinsic side declared at the same level
            // would both be valid here; lookup keeps only the extrinsic one.
            _ => self
                .selected(edge)
                .filter(|s| !self.cruft.has_node(s.node)),
        }
    }

    /// Returns the picked successors of every outbound edge of `node`.
    pub fn each_successor_of(&self, node: NodeId) -> Vec<Successor> {
        self.graph
            .node(node)
            .outbounds
            .iter()
            .filter_map(|e| self.pick_successor(*e))
            .collect()
    }

    /// Walks every edge reachable from the node of `parallel`, faulting
    /// same-level cycles and deciding undecided polymorphic edges.
    pub fn resolve_successors(&mut self, parallel: ParallelId) -> Result<(), ResolveError> {
        let graph = Rc::clone(&self.graph);
        let node = self
            .parallel(parallel)
            .as_specified()
            .map(|sp| sp.node)
            .ok_or_else(|| ResolveError::unknown_state("resolving an unspecified parallel"))?;

        let mut walk = SuccessorWalk::default();
        for &edge in &graph.node(node).outbounds {
            self.find_polymorphic_edges(&graph, parallel, edge, Vec::new(), &mut walk)?;
        }

        for path in &walk.cycles {
            let names: Vec<&str> = path
                .iter()
                .map(|e| graph.edge(*e).identifier.as_str())
                .collect();
            tracing::warn!(path = %names.join(" + "), "circular type reference");
        }
        let faulted: IndexSet<HyperEdgeId> = walk.cycles.into_iter().flatten().collect();
        for edge in faulted {
            self.add_fault(CruftKey::Edge(edge), FaultKind::CircularTypeReference);
        }
        Ok(())
    }

    fn find_polymorphic_edges(
        &mut self,
        graph: &DocumentGraph,
        parallel: ParallelId,
        edge: HyperEdgeId,
        path: Vec<HyperEdgeId>,
        walk: &mut SuccessorWalk,
    ) -> Result<(), ResolveError> {
        if path.contains(&edge) {
            walk.cycles.push(path);
            return Ok(());
        }
        if self.cruft.has_edge(edge) || walk.done.contains(&edge) || !walk.active.insert(edge) {
            return Ok(());
        }

        let hyper = graph.edge(edge);
        let level = graph.node(hyper.predecessor).container;
        for successor in &hyper.successors {
            let target = graph.node(successor.node);
            for &next in &target.outbounds {
                let next_path = if target.container == level {
                    let mut p = path.clone();
                    p.push(edge);
                    p
                } else {
                    Vec::new()
                };
                self.find_polymorphic_edges(graph, parallel, next, next_path, walk)?;
            }
        }

        walk.active.remove(&edge);
        walk.done.insert(edge);

        if hyper.successors.len() < 2 || self.selected.contains_key(&edge) {
            return Ok(());
        }

        let chosen = self.select_successor(parallel, hyper)?;
        tracing::debug!(
            edge = %edge,
            identifier = %hyper.identifier,
            target = %graph.node(chosen.node).uri,
            "polymorphic edge resolved"
        );
        self.selected.insert(edge, chosen);
        Ok(())
    }

    /// Picks the candidate whose existence best covers the existence of
    /// `parallel`. Ties keep the earlier candidate.
    fn select_successor(
        &mut self,
        parallel: ParallelId,
        hyper: &HyperEdge,
    ) -> Result<Successor, ResolveError> {
        let src = self.existence(parallel);
        let mut greatest = -1.0;
        let mut target: Option<Successor> = None;

        for successor in &hyper.successors {
            let uri = self.graph.node(successor.node).uri.clone();
            let Some(layer) = self.maybe_construct(&uri)? else {
                continue;
            };
            let Some(seed) = self.layer(layer).seed else {
                continue;
            };
            if !self.parallel(seed).is_specified() {
                return Err(ResolveError::unknown_state(format!(
                    "candidate '{uri}' resolved to an unspecified parallel"
                )));
            }

            let factor = subset_factor(&src, &self.existence(seed));
            if factor > greatest {
                greatest = factor;
                target = Some(*successor);
            }
        }

        Ok(target.unwrap_or(hyper.successors[0]))
    }

    /// Returns the URI texts of every container occupied by `parallel` or
    /// by any parallel transitively reachable from it.
    pub fn existence(&self, parallel: ParallelId) -> HashSet<String> {
        let mut out = HashSet::new();
        let mut seen: HashSet<ParallelId> = HashSet::new();
        let mut queue: VecDeque<ParallelId> = VecDeque::from([parallel]);

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let p = self.parallel(id);
            for depth in 0..p.uri().depth() {
                out.insert(p.uri().retract_type_to(depth).to_string());
            }
            queue.extend(p.parallels().iter().copied());
        }
        out
    }

    // ------------------------------------------------------------------
    // Faults
    // ------------------------------------------------------------------

    /// Reports a fault on every concrete source of `source` and marks them,
    /// and `source` itself, as cruft.
    pub fn add_fault(&mut self, source: CruftKey, kind: FaultKind) {
        let sources: Vec<FaultSource> = match source {
            CruftKey::Node(node) => self
                .graph
                .node(node)
                .statements
                .iter()
                .map(|s| FaultSource::Statement(*s))
                .collect(),
            CruftKey::Edge(edge) => self
                .graph
                .edge(edge)
                .sources
                .iter()
                .map(|s| FaultSource::Span(*s))
                .collect(),
            CruftKey::Source(s) => vec![s],
        };

        let sink = self.sink.upgrade();
        for s in sources {
            if let (Some(sink), Some(at)) = (&sink, self.graph.locate(s.statement())) {
                sink.report(Fault::new(kind, s, at.document, at.line));
            }
            self.cruft.add(CruftKey::Source(s));
        }
        self.cruft.add(source);
    }
}
