//! DocumentGraph: declaration nodes and the inheritance hyperedges between
//! them, built from a set of documents.
//!
//! A graph is built wholesale by [`DocumentGraph::build`] and never mutated
//! afterwards. Nodes live in a petgraph `StableGraph` whose edges link each
//! hyperedge predecessor to every candidate successor, which makes inbound
//! queries a plain petgraph walk. Hyperedges themselves are kept in a side
//! table indexed by [`HyperEdgeId`].
//!
//! # Name lookup
//!
//! An annotation on a node is looked up among the node's siblings, then at
//! each enclosing level up to the document root, then among the roots of the
//! documents the owning document depends on. Every level that declares the
//! name contributes one candidate successor, nearest first. Edges with more
//! than one candidate are polymorphic and are disambiguated later, during
//! resolution.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::document::Document;
use crate::id::{DocumentId, HyperEdgeId, NodeId, StatementId};
use crate::statement::{PatternSubject, SpanRef, StatementKind, Subject, LIST_SUFFIX};
use crate::uri::Uri;

/// A declaration site.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub document: DocumentId,
    pub uri: Uri,
    /// The last component of the node's type path.
    pub name: String,
    pub subject: Subject,
    pub container: Option<NodeId>,
    /// Child declarations, keyed by name, in declaration order.
    pub contents: IndexMap<String, NodeId>,
    /// Declared bases, in declaration order.
    pub outbounds: Vec<HyperEdgeId>,
    /// Statements declaring this node.
    pub statements: SmallVec<[StatementId; 1]>,
}

impl Node {
    pub fn is_pattern(&self) -> bool {
        self.subject.is_pattern()
    }

    pub fn is_list(&self) -> bool {
        self.subject.is_list()
    }

    pub fn is_uri(&self) -> bool {
        matches!(self.subject, Subject::Uri(_))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.subject, Subject::Anonymous)
    }

    pub fn pattern(&self) -> Option<&PatternSubject> {
        match &self.subject {
            Subject::Pattern(p) => Some(p),
            _ => None,
        }
    }
}

/// One candidate target of a hyperedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Successor {
    pub edge: HyperEdgeId,
    pub node: NodeId,
}

/// A directed relation from a predecessor node to one or more candidate
/// base nodes.
#[derive(Debug, Clone)]
pub struct HyperEdge {
    pub id: HyperEdgeId,
    pub predecessor: NodeId,
    pub successors: SmallVec<[Successor; 2]>,
    /// Annotation spans that declared this edge.
    pub sources: Vec<SpanRef>,
    /// The annotation text.
    pub identifier: String,
    /// `true` when the edge resolved to a pattern matching its identifier
    /// rather than to a declared name.
    pub aliased: bool,
}

impl HyperEdge {
    pub fn is_polymorphic(&self) -> bool {
        self.successors.len() > 1
    }
}

/// A loaded document as seen by the graph.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub id: DocumentId,
    pub uri: Uri,
    /// Root-level declarations, keyed by name.
    pub roots: IndexMap<String, NodeId>,
    /// Documents referenced by this one, in reference order.
    pub dependencies: Vec<DocumentId>,
}

/// Where a statement currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementLocation {
    pub document: DocumentId,
    pub line: u32,
}

/// Structural problems found while building a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphFaultKind {
    UnresolvedResource,
    CircularResourceReference,
    InvalidPattern,
    UnresolvedAnnotation,
}

/// A structural problem attached to a statement or one of its annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphFault {
    pub kind: GraphFaultKind,
    pub statement: StatementId,
    /// Annotation index, for faults on a single annotation.
    pub span: Option<u16>,
    pub document: DocumentId,
    pub line: u32,
}

/// Result of [`DocumentGraph::build`].
#[derive(Debug)]
pub struct GraphBuild {
    pub graph: DocumentGraph,
    pub faults: Vec<GraphFault>,
}

/// Immutable graph of declarations across a set of documents.
#[derive(Debug, Default)]
pub struct DocumentGraph {
    graph: StableGraph<Node, HyperEdgeId, Directed, u32>,
    edges: Vec<HyperEdge>,
    documents: IndexMap<DocumentId, DocumentEntry>,
    /// URI text to node.
    by_uri: HashMap<String, NodeId>,
    statements: HashMap<StatementId, StatementLocation>,
}

/// An annotation waiting for name lookup.
struct PendingAnnotation {
    node: NodeId,
    text: String,
    span: SpanRef,
    line: u32,
}

impl DocumentGraph {
    /// Builds a graph from the given documents.
    pub fn build<'a, I>(documents: I) -> GraphBuild
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut builder = GraphBuilder::default();
        let docs: Vec<&Document> = documents.into_iter().collect();

        for doc in &docs {
            builder.read_document(doc);
        }
        for doc in &docs {
            builder.link_references(doc);
        }
        builder.resolve_annotations();

        GraphBuild {
            graph: builder.graph,
            faults: builder.faults,
        }
    }

    // ------------------------------------------------------------------
    // Read-only accessors
    // ------------------------------------------------------------------

    /// Returns the node with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this graph.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.graph[NodeIndex::from(id)]
    }

    /// Returns the hyperedge with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this graph.
    pub fn edge(&self, id: HyperEdgeId) -> &HyperEdge {
        &self.edges[id.0 as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn edges(&self) -> &[HyperEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the hyperedges naming `id` as a candidate successor.
    pub fn inbounds(&self, id: NodeId) -> Vec<HyperEdgeId> {
        let mut out: Vec<HyperEdgeId> = Vec::new();
        for e in self
            .graph
            .edges_directed(NodeIndex::from(id), Direction::Incoming)
        {
            if !out.contains(e.weight()) {
                out.push(*e.weight());
            }
        }
        out.sort();
        out
    }

    /// Resolves a node by its URI.
    pub fn read(&self, uri: &Uri) -> Option<NodeId> {
        self.by_uri.get(&uri.to_string()).copied()
    }

    /// Returns the root nodes of a document, in declaration order.
    pub fn read_roots(&self, document: DocumentId) -> Vec<NodeId> {
        self.documents
            .get(&document)
            .map(|d| d.roots.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn document(&self, id: DocumentId) -> Option<&DocumentEntry> {
        self.documents.get(&id)
    }

    pub fn document_by_uri(&self, uri: &Uri) -> Option<&DocumentEntry> {
        let target = uri.document_uri();
        self.documents.values().find(|d| d.uri == target)
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentEntry> {
        self.documents.values()
    }

    /// Returns the current location of a statement.
    pub fn locate(&self, statement: StatementId) -> Option<StatementLocation> {
        self.statements.get(&statement).copied()
    }
}

// ----------------------------------------------------------------------
// Building
// ----------------------------------------------------------------------

#[derive(Default)]
struct GraphBuilder {
    graph: DocumentGraph,
    faults: Vec<GraphFault>,
    pending: Vec<PendingAnnotation>,
}

impl GraphBuilder {
    fn read_document(&mut self, doc: &Document) {
        self.graph.documents.insert(
            doc.id(),
            DocumentEntry {
                id: doc.id(),
                uri: doc.uri().clone(),
                roots: IndexMap::new(),
                dependencies: Vec::new(),
            },
        );

        // Enclosing declarations: (indent, nodes declared on that line).
        let mut stack: Vec<(u32, Vec<NodeId>)> = Vec::new();

        for stmt in doc.statements() {
            self.graph.statements.insert(
                stmt.id,
                StatementLocation {
                    document: doc.id(),
                    line: stmt.line,
                },
            );

            if matches!(stmt.kind, StatementKind::Reference(_)) {
                stack.clear();
                continue;
            }
            if !stmt.is_declaration() {
                continue;
            }

            while stack.last().is_some_and(|(indent, _)| *indent >= stmt.indent) {
                stack.pop();
            }

            let parents: Vec<Option<NodeId>> = match stack.last() {
                Some((_, nodes)) => nodes.iter().copied().map(Some).collect(),
                None => vec![None],
            };

            let mut declared = Vec::new();
            for parent in &parents {
                for subject in &stmt.declarations {
                    let node = self.declare(doc, *parent, subject, stmt.line);
                    let n = &mut self.graph.graph[NodeIndex::from(node)];
                    if !n.statements.contains(&stmt.id) {
                        n.statements.push(stmt.id);
                    }
                    for (index, text) in stmt.annotations.iter().enumerate() {
                        self.pending.push(PendingAnnotation {
                            node,
                            text: text.clone(),
                            span: stmt.span(index as u16),
                            line: stmt.line,
                        });
                    }
                    declared.push(node);
                }
            }

            let invalid_pattern = stmt
                .declarations
                .iter()
                .any(|s| matches!(s, Subject::Pattern(p) if p.regex.is_none()));
            if invalid_pattern {
                self.faults.push(GraphFault {
                    kind: GraphFaultKind::InvalidPattern,
                    statement: stmt.id,
                    span: None,
                    document: doc.id(),
                    line: stmt.line,
                });
            }

            stack.push((stmt.indent, declared));
        }
    }

    /// Returns the node for `subject` under `parent`, creating it if needed.
    fn declare(
        &mut self,
        doc: &Document,
        parent: Option<NodeId>,
        subject: &Subject,
        line: u32,
    ) -> NodeId {
        let name = subject.key(line);
        let existing = match parent {
            Some(p) => self.graph.node(p).contents.get(&name).copied(),
            None => self
                .graph
                .documents
                .get(&doc.id())
                .and_then(|d| d.roots.get(&name).copied()),
        };
        if let Some(id) = existing {
            return id;
        }

        let uri = match parent {
            Some(p) => self.graph.node(p).uri.extend_type(&name),
            None => doc.uri().extend_type(&name),
        };

        let idx = self.graph.graph.add_node(Node {
            id: NodeId(0),
            document: doc.id(),
            uri: uri.clone(),
            name: name.clone(),
            subject: subject.clone(),
            container: parent,
            contents: IndexMap::new(),
            outbounds: Vec::new(),
            statements: SmallVec::new(),
        });
        let id = NodeId::from(idx);
        self.graph.graph[idx].id = id;
        self.graph.by_uri.insert(uri.to_string(), id);

        match parent {
            Some(p) => {
                self.graph.graph[NodeIndex::from(p)]
                    .contents
                    .insert(name, id);
            }
            None => {
                if let Some(entry) = self.graph.documents.get_mut(&doc.id()) {
                    entry.roots.insert(name, id);
                }
            }
        }
        id
    }

    /// Links root-level document references, faulting missing targets and
    /// references that would close a cycle.
    fn link_references(&mut self, doc: &Document) {
        let index: HashMap<DocumentId, usize> = self
            .graph
            .documents
            .keys()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        for (stmt, uri) in doc.references() {
            let target = self.graph.document_by_uri(uri).map(|d| d.id);
            let kind = match target {
                None => Some(GraphFaultKind::UnresolvedResource),
                Some(target) => {
                    let deps = self.dependency_graph(&index);
                    let from = NodeIndex::new(index[&doc.id()]);
                    let to = NodeIndex::new(index[&target]);
                    if from == to || has_path_connecting(&deps, to, from, None) {
                        Some(GraphFaultKind::CircularResourceReference)
                    } else {
                        if let Some(entry) = self.graph.documents.get_mut(&doc.id()) {
                            if !entry.dependencies.contains(&target) {
                                entry.dependencies.push(target);
                            }
                        }
                        None
                    }
                }
            };

            if let Some(kind) = kind {
                self.faults.push(GraphFault {
                    kind,
                    statement: stmt.id,
                    span: None,
                    document: doc.id(),
                    line: stmt.line,
                });
            }
        }
    }

    fn dependency_graph(&self, index: &HashMap<DocumentId, usize>) -> DiGraph<DocumentId, ()> {
        let mut deps = DiGraph::new();
        for id in self.graph.documents.keys() {
            deps.add_node(*id);
        }
        for entry in self.graph.documents.values() {
            for dep in &entry.dependencies {
                deps.add_edge(
                    NodeIndex::new(index[&entry.id]),
                    NodeIndex::new(index[dep]),
                    (),
                );
            }
        }
        deps
    }

    fn resolve_annotations(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let mut by_key: HashMap<(NodeId, String), HyperEdgeId> = HashMap::new();

        for p in pending {
            if let Some(&id) = by_key.get(&(p.node, p.text.clone())) {
                let edge = &mut self.graph.edges[id.0 as usize];
                edge.sources.push(p.span);
                if edge.successors.is_empty() {
                    self.unresolved(&p);
                }
                continue;
            }

            let id = HyperEdgeId(self.graph.edges.len() as u32);
            let mut aliased = false;
            let mut targets = self.lookup(p.node, &p.text);
            if targets.is_empty() {
                if let Some(pattern) = self.alias(p.node, &p.text) {
                    targets.push(pattern);
                    aliased = true;
                }
            }
            if targets.is_empty() {
                self.unresolved(&p);
            }

            let successors: SmallVec<[Successor; 2]> = targets
                .iter()
                .map(|&node| Successor { edge: id, node })
                .collect();
            for s in &successors {
                self.graph
                    .graph
                    .add_edge(NodeIndex::from(p.node), NodeIndex::from(s.node), id);
            }

            self.graph.edges.push(HyperEdge {
                id,
                predecessor: p.node,
                successors,
                sources: vec![p.span],
                identifier: p.text.clone(),
                aliased,
            });
            self.graph.graph[NodeIndex::from(p.node)].outbounds.push(id);
            by_key.insert((p.node, p.text), id);
        }
    }

    fn unresolved(&mut self, p: &PendingAnnotation) {
        let document = self.graph.node(p.node).document;
        self.faults.push(GraphFault {
            kind: GraphFaultKind::UnresolvedAnnotation,
            statement: p.span.statement,
            span: Some(p.span.index),
            document,
            line: p.line,
        });
    }

    /// Returns the scopes visible from `node`, nearest first.
    fn scopes(&self, node: NodeId) -> Vec<&IndexMap<String, NodeId>> {
        let graph = &self.graph;
        let n = graph.node(node);
        let mut scopes = Vec::new();

        let mut level = n.container;
        while let Some(c) = level {
            let container = graph.node(c);
            scopes.push(&container.contents);
            level = container.container;
        }

        let mut seen: HashSet<DocumentId> = HashSet::new();
        let mut queue: VecDeque<DocumentId> = VecDeque::from([n.document]);
        while let Some(doc) = queue.pop_front() {
            if !seen.insert(doc) {
                continue;
            }
            if let Some(entry) = graph.documents.get(&doc) {
                scopes.push(&entry.roots);
                queue.extend(entry.dependencies.iter().copied());
            }
        }
        scopes
    }

    /// Collects one candidate per visible scope declaring `name`.
    fn lookup(&self, node: NodeId, name: &str) -> Vec<NodeId> {
        if Uri::looks_like_uri(name) {
            return Uri::parse(name)
                .ok()
                .and_then(|uri| self.graph.read(&uri))
                .into_iter()
                .collect();
        }

        let list = format!("{name}{LIST_SUFFIX}");
        let mut out: Vec<NodeId> = Vec::new();
        for scope in self.scopes(node) {
            let hit = scope.get(name).or_else(|| scope.get(&list)).copied();
            if let Some(hit) = hit {
                if !out.contains(&hit) {
                    out.push(hit);
                }
            }
        }
        out
    }

    /// Finds the first pattern in scope matching `text`.
    fn alias(&self, node: NodeId, text: &str) -> Option<NodeId> {
        self.scopes(node).into_iter().find_map(|scope| {
            scope.values().copied().find(|&candidate| {
                self.graph
                    .node(candidate)
                    .pattern()
                    .is_some_and(|p| p.matches(text))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StatementIds;

    fn docs(sources: &[(&str, &str)]) -> Vec<Document> {
        let mut ids = StatementIds::new();
        sources
            .iter()
            .enumerate()
            .map(|(i, (uri, text))| {
                Document::new(
                    DocumentId(i as u32),
                    Uri::parse(uri).unwrap(),
                    text,
                    &mut ids,
                )
            })
            .collect()
    }

    fn node_at<'g>(graph: &'g DocumentGraph, uri: &str) -> &'g Node {
        let id = graph
            .read(&Uri::parse(uri).unwrap())
            .unwrap_or_else(|| panic!("no node at {uri}"));
        graph.node(id)
    }

    fn successor_uris(graph: &DocumentGraph, node: &Node) -> Vec<String> {
        let edge = graph.edge(node.outbounds[0]);
        edge.successors
            .iter()
            .map(|s| graph.node(s.node).uri.to_string())
            .collect()
    }

    #[test]
    fn builds_containment() {
        let d = docs(&[("memory://a.strata", "Dog\n\tName\n\tLegs\nCat")]);
        let build = DocumentGraph::build(&d);
        let g = &build.graph;
        assert!(build.faults.is_empty());
        assert_eq!(g.node_count(), 4);

        let dog = node_at(g, "memory://a.strata#Dog");
        assert_eq!(
            dog.contents.keys().collect::<Vec<_>>(),
            vec!["Name", "Legs"]
        );
        let name = node_at(g, "memory://a.strata#Dog/Name");
        assert_eq!(name.container, Some(dog.id));
        assert_eq!(g.read_roots(DocumentId(0)).len(), 2);
    }

    #[test]
    fn repeated_declarations_share_a_node() {
        let d = docs(&[("memory://a.strata", "A\nA : B\nB")]);
        let build = DocumentGraph::build(&d);
        let a = node_at(&build.graph, "memory://a.strata#A");
        assert_eq!(a.statements.len(), 2);
        assert_eq!(a.outbounds.len(), 1);
    }

    #[test]
    fn children_attach_to_every_subject() {
        let d = docs(&[("memory://a.strata", "Dog, Cat\n\tName")]);
        let g = DocumentGraph::build(&d).graph;
        assert!(g.read(&Uri::parse("memory://a.strata#Dog/Name").unwrap()).is_some());
        assert!(g.read(&Uri::parse("memory://a.strata#Cat/Name").unwrap()).is_some());
    }

    #[test]
    fn polymorphic_candidates_nearest_first() {
        let d = docs(&[(
            "memory://a.strata",
            "Name\nPerson\n\tName\n\tFull : Name",
        )]);
        let g = DocumentGraph::build(&d).graph;
        let full = node_at(&g, "memory://a.strata#Person/Full");
        assert!(g.edge(full.outbounds[0]).is_polymorphic());
        assert_eq!(
            successor_uris(&g, full),
            vec!["memory://a.strata#Person/Name", "memory://a.strata#Name"]
        );
    }

    #[test]
    fn extrinsic_declaration_preferred_over_list() {
        let d = docs(&[("memory://a.strata", "Item...\nItem\nX : Item")]);
        let g = DocumentGraph::build(&d).graph;
        let x = node_at(&g, "memory://a.strata#X");
        assert_eq!(successor_uris(&g, x), vec!["memory://a.strata#Item"]);

        let d = docs(&[("memory://b.strata", "Item...\nX : Item")]);
        let g = DocumentGraph::build(&d).graph;
        let x = node_at(&g, "memory://b.strata#X");
        assert_eq!(successor_uris(&g, x), vec!["memory://b.strata#Item..."]);
    }

    #[test]
    fn unmatched_annotation_aliases_a_pattern() {
        let d = docs(&[(
            "memory://a.strata",
            "Number\n/\\d+/ : Number\nAge : 10",
        )]);
        let build = DocumentGraph::build(&d);
        assert!(build.faults.is_empty());
        let g = &build.graph;
        let age = node_at(g, "memory://a.strata#Age");
        let edge = g.edge(age.outbounds[0]);
        assert!(edge.aliased);
        assert_eq!(edge.identifier, "10");
        assert!(g.node(edge.successors[0].node).is_pattern());
    }

    #[test]
    fn unresolved_annotation_faults_the_span() {
        let d = docs(&[("memory://a.strata", "A\nB : A, Missing")]);
        let build = DocumentGraph::build(&d);
        assert_eq!(build.faults.len(), 1);
        let fault = &build.faults[0];
        assert_eq!(fault.kind, GraphFaultKind::UnresolvedAnnotation);
        assert_eq!(fault.span, Some(1));
        assert_eq!(fault.line, 1);

        let b = node_at(&build.graph, "memory://a.strata#B");
        assert!(build.graph.edge(b.outbounds[1]).successors.is_empty());
    }

    #[test]
    fn invalid_pattern_faults_the_statement() {
        let d = docs(&[("memory://a.strata", "Number\n/[0-9/ : Number")]);
        let build = DocumentGraph::build(&d);
        assert_eq!(build.faults.len(), 1);
        assert_eq!(build.faults[0].kind, GraphFaultKind::InvalidPattern);
        assert_eq!(build.graph.node_count(), 2);
    }

    #[test]
    fn references_expose_dependency_roots() {
        let d = docs(&[
            ("memory://lib.strata", "Animal"),
            ("memory://main.strata", "memory://lib.strata\nDog : Animal"),
        ]);
        let build = DocumentGraph::build(&d);
        assert!(build.faults.is_empty());
        let g = &build.graph;
        let dog = node_at(g, "memory://main.strata#Dog");
        assert_eq!(successor_uris(g, dog), vec!["memory://lib.strata#Animal"]);
        assert_eq!(
            g.document(DocumentId(1)).unwrap().dependencies,
            vec![DocumentId(0)]
        );

        let animal = node_at(g, "memory://lib.strata#Animal");
        assert_eq!(g.inbounds(animal.id), vec![dog.outbounds[0]]);
    }

    #[test]
    fn uri_annotations_resolve_directly() {
        let d = docs(&[
            ("memory://lib.strata", "Animal\n\tName"),
            ("memory://main.strata", "Label : memory://lib.strata#Animal/Name"),
        ]);
        let g = DocumentGraph::build(&d).graph;
        let label = node_at(&g, "memory://main.strata#Label");
        assert_eq!(successor_uris(&g, label), vec!["memory://lib.strata#Animal/Name"]);
    }

    #[test]
    fn missing_and_circular_resources() {
        let d = docs(&[
            ("memory://a.strata", "memory://b.strata\nmemory://nowhere.strata"),
            ("memory://b.strata", "memory://a.strata"),
        ]);
        let build = DocumentGraph::build(&d);
        let kinds: Vec<(GraphFaultKind, DocumentId)> =
            build.faults.iter().map(|f| (f.kind, f.document)).collect();
        assert_eq!(
            kinds,
            vec![
                (GraphFaultKind::UnresolvedResource, DocumentId(0)),
                (GraphFaultKind::CircularResourceReference, DocumentId(1)),
            ]
        );
    }

    #[test]
    fn statements_are_located() {
        let d = docs(&[("memory://a.strata", "// header\nA")]);
        let a_stmt = d[0].read(1).unwrap().id;
        let g = DocumentGraph::build(&d).graph;
        assert_eq!(
            g.locate(a_stmt),
            Some(StatementLocation {
                document: DocumentId(0),
                line: 1
            })
        );
    }
}
