//! Program: documents, the graph built from them, faults and hooks.
//!
//! Every mutation runs as one edit transaction: the touched statements are
//! announced with [`HookEvent::Invalidate`], the version advances, the graph
//! is rebuilt and, with eager verification, every declared node is resolved
//! again. Lazy programs resolve again only the nodes holding global faults. The fault diff of the transaction is broadcast before
//! [`HookEvent::EditComplete`].

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use strata_core::{
    Document, DocumentEditor, DocumentGraph, DocumentId, StatementId, StatementIds, Uri,
    VersionStamp,
};
use strata_faults::{Fault, FaultService, FaultSink, FaultSource};

use crate::error::ResolveError;
use crate::hooks::{HookEvent, Hooks};
use crate::options::ProgramOptions;
use crate::types::cache::TypeRegistry;
use crate::types::{Type, TypeList};
use crate::worker::ConstructionWorker;

/// Shared state behind a [`Program`] handle.
pub struct ProgramState {
    options: ProgramOptions,
    version: Cell<VersionStamp>,
    documents: RefCell<IndexMap<DocumentId, Document>>,
    graph: RefCell<Rc<DocumentGraph>>,
    faults: RefCell<FaultService>,
    hooks: Hooks,
    types: RefCell<TypeRegistry>,
    statement_ids: RefCell<StatementIds>,
    next_document: Cell<u32>,
    editing: Cell<bool>,
}

impl ProgramState {
    pub(crate) fn version(&self) -> VersionStamp {
        self.version.get()
    }

    pub(crate) fn types(&self) -> &RefCell<TypeRegistry> {
        &self.types
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing.get()
    }

    /// Returns the construction worker for the current version.
    pub(crate) fn worker(self: &Rc<Self>) -> Rc<ConstructionWorker> {
        let version = self.version();
        let graph = Rc::clone(&self.graph.borrow());
        let weak: Weak<ProgramState> = Rc::downgrade(self);
        let sink: Weak<dyn FaultSink> = weak;
        let max_depth = self.options.max_layer_depth;
        self.types
            .borrow_mut()
            .worker(version, || ConstructionWorker::new(version, graph, sink, max_depth))
    }

    fn rebuild_graph(&self) {
        let build = {
            let documents = self.documents.borrow();
            DocumentGraph::build(documents.values())
        };
        tracing::debug!(
            version = %self.version(),
            nodes = build.graph.node_count(),
            faults = build.faults.len(),
            "document graph rebuilt"
        );
        *self.graph.borrow_mut() = Rc::new(build.graph);
        for fault in &build.faults {
            self.report(Fault::from(fault));
        }
    }

    /// Resolves a type for every declared node, so that resolution faults
    /// are reported in the current transaction.
    fn verify(self: &Rc<Self>) -> Result<(), ResolveError> {
        let graph = Rc::clone(&self.graph.borrow());
        for node in graph.nodes() {
            Type::construct_in(self, &node.uri)?;
        }
        Ok(())
    }

    /// Resolves only the nodes declared by `statements`. Lazy programs use
    /// this to re-report the global faults a transaction invalidated.
    fn reverify(self: &Rc<Self>, statements: &HashSet<StatementId>) -> Result<(), ResolveError> {
        if statements.is_empty() {
            return Ok(());
        }
        let graph = Rc::clone(&self.graph.borrow());
        for node in graph.nodes() {
            if node.statements.iter().any(|s| statements.contains(s)) {
                Type::construct_in(self, &node.uri)?;
            }
        }
        Ok(())
    }

    /// Runs one edit transaction replacing (or, with `None`, removing)
    /// `document`. `parents` are the pre-edit statements the edit touched.
    fn commit(
        self: &Rc<Self>,
        document: DocumentId,
        replacement: Option<Document>,
        parents: Vec<StatementId>,
    ) -> Result<(), ResolveError> {
        self.editing.set(true);
        self.hooks.enqueue(HookEvent::Invalidate {
            document,
            parents: parents.clone(),
        });
        let revisit: HashSet<StatementId> = {
            let mut faults = self.faults.borrow_mut();
            faults.begin_transaction(parents);
            faults.invalidate_where(|f| f.kind.is_global());
            faults
                .each()
                .iter()
                .filter(|f| f.kind.is_global())
                .map(|f| f.source.statement())
                .collect()
        };
        {
            let mut documents = self.documents.borrow_mut();
            match replacement {
                Some(doc) => {
                    documents.insert(document, doc);
                }
                None => {
                    documents.shift_remove(&document);
                }
            }
        }

        self.version.set(VersionStamp::next());
        self.rebuild_graph();
        let verified = if self.options.eager_verification {
            self.verify()
        } else {
            self.reverify(&revisit)
        };

        let events = self.faults.borrow_mut().end_transaction();
        for event in events {
            self.hooks.enqueue(event.into());
        }
        self.hooks.enqueue(HookEvent::EditComplete { document });
        self.editing.set(false);
        self.hooks.flush();
        verified
    }
}

impl FaultSink for ProgramState {
    fn report(&self, fault: Fault) {
        let events = self.faults.borrow_mut().report(fault);
        for event in events {
            self.hooks.enqueue(event.into());
        }
    }
}

/// A set of documents resolved together. Cloning yields another handle to
/// the same program.
#[derive(Clone)]
pub struct Program {
    state: Rc<ProgramState>,
}

impl Program {
    pub fn new(options: ProgramOptions) -> Self {
        Program {
            state: Rc::new(ProgramState {
                options,
                version: Cell::new(VersionStamp::next()),
                documents: RefCell::new(IndexMap::new()),
                graph: RefCell::new(Rc::new(DocumentGraph::default())),
                faults: RefCell::new(FaultService::new()),
                hooks: Hooks::new(),
                types: RefCell::new(TypeRegistry::new()),
                statement_ids: RefCell::new(StatementIds::new()),
                next_document: Cell::new(0),
                editing: Cell::new(false),
            }),
        }
    }

    pub(crate) fn state(&self) -> &Rc<ProgramState> {
        &self.state
    }

    pub fn options(&self) -> &ProgramOptions {
        &self.state.options
    }

    pub fn version(&self) -> VersionStamp {
        self.state.version()
    }

    /// Returns the graph of the current version.
    pub fn graph(&self) -> Rc<DocumentGraph> {
        Rc::clone(&self.state.graph.borrow())
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Adds a document. Only the document part of `uri` is kept.
    pub fn create_document(&self, uri: &Uri, text: &str) -> Result<DocumentId, ResolveError> {
        let uri = uri.document_uri();
        if self.document_by_uri(&uri).is_some() {
            return Err(ResolveError::DocumentExists {
                uri: uri.to_string(),
            });
        }

        let id = DocumentId(self.state.next_document.get());
        self.state.next_document.set(id.0 + 1);
        let document = {
            let mut ids = self.state.statement_ids.borrow_mut();
            Document::new(id, uri, text, &mut ids)
        };
        tracing::debug!(document = %id, uri = %document.uri(), "document created");
        self.state.commit(id, Some(document), Vec::new())?;
        Ok(id)
    }

    /// Applies the edits recorded by `f` to `document` as one transaction.
    /// Nothing changes if any edit is out of range.
    pub fn edit<F>(&self, document: DocumentId, f: F) -> Result<(), ResolveError>
    where
        F: FnOnce(&mut DocumentEditor),
    {
        let mut editor = DocumentEditor::new();
        f(&mut editor);
        let edits = editor.into_edits();

        let mut edited = self
            .state
            .documents
            .borrow()
            .get(&document)
            .cloned()
            .ok_or(ResolveError::DocumentNotFound { id: document })?;
        let touched = {
            let mut ids = self.state.statement_ids.borrow_mut();
            edited.apply(&edits, &mut ids)?
        };
        tracing::debug!(
            document = %document,
            edits = edits.len(),
            touched = touched.len(),
            "document edited"
        );
        self.state.commit(document, Some(edited), touched)
    }

    pub fn delete_document(&self, document: DocumentId) -> Result<(), ResolveError> {
        let parents: Vec<StatementId> = self
            .state
            .documents
            .borrow()
            .get(&document)
            .ok_or(ResolveError::DocumentNotFound { id: document })?
            .statements()
            .iter()
            .map(|s| s.id)
            .collect();
        tracing::debug!(document = %document, "document deleted");
        self.state.commit(document, None, parents)
    }

    pub fn documents(&self) -> Vec<DocumentId> {
        self.state.documents.borrow().keys().copied().collect()
    }

    /// Returns a snapshot of `document`.
    pub fn document(&self, document: DocumentId) -> Option<Document> {
        self.state.documents.borrow().get(&document).cloned()
    }

    pub fn document_by_uri(&self, uri: &Uri) -> Option<DocumentId> {
        let uri = uri.document_uri();
        self.state
            .documents
            .borrow()
            .values()
            .find(|d| *d.uri() == uri)
            .map(Document::id)
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    pub fn construct(&self, uri: &Uri) -> Result<Option<Rc<Type>>, ResolveError> {
        Type::construct(self, uri)
    }

    pub fn construct_roots(&self, document: DocumentId) -> Result<TypeList, ResolveError> {
        Type::construct_roots(self, document)
    }

    // ------------------------------------------------------------------
    // Faults and hooks
    // ------------------------------------------------------------------

    pub fn fault_count(&self) -> usize {
        self.state.faults.borrow().count()
    }

    /// Returns the committed faults ordered by document and by the current
    /// line of their statements.
    pub fn faults(&self) -> Vec<Fault> {
        let graph = self.graph();
        let mut faults: Vec<Fault> = self
            .state
            .faults
            .borrow()
            .each()
            .into_iter()
            .map(|mut fault| {
                if let Some(at) = graph.locate(fault.source.statement()) {
                    fault.document = at.document;
                    fault.line = at.line;
                }
                fault
            })
            .collect();
        faults.sort_by(|a, b| {
            (a.document, a.line, a.source, a.kind).cmp(&(b.document, b.line, b.source, b.kind))
        });
        faults
    }

    pub fn has_fault(&self, fault: &Fault) -> bool {
        self.state.faults.borrow().has(fault)
    }

    pub fn check(&self, source: FaultSource) -> Vec<Fault> {
        self.state.faults.borrow().check(source)
    }

    /// Registers a listener for every subsequent [`HookEvent`].
    pub fn on<F>(&self, listener: F)
    where
        F: FnMut(&HookEvent) + 'static,
    {
        self.state.hooks.listen(Box::new(listener));
    }
}

impl Default for Program {
    fn default() -> Self {
        Program::new(ProgramOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_faults::FaultKind;

    fn uri(text: &str) -> Uri {
        Uri::parse(text).unwrap()
    }

    #[test]
    fn duplicate_documents_are_rejected() {
        let program = Program::default();
        program.create_document(&uri("memory://a.strata"), "A").unwrap();
        let err = program
            .create_document(&uri("memory://a.strata#Ignored"), "B")
            .unwrap_err();
        assert!(matches!(err, ResolveError::DocumentExists { .. }));
    }

    #[test]
    fn every_edit_advances_the_version() {
        let program = Program::default();
        let v0 = program.version();
        let doc = program.create_document(&uri("memory://a.strata"), "A").unwrap();
        let v1 = program.version();
        assert!(v1.newer_than(v0));

        program.edit(doc, |facts| {
            facts.insert("B", 1);
        })
        .unwrap();
        assert!(program.version().newer_than(v1));
    }

    #[test]
    fn failed_edits_change_nothing() {
        let program = Program::default();
        let doc = program.create_document(&uri("memory://a.strata"), "A").unwrap();
        let before = program.version();
        let err = program.edit(doc, |facts| {
            facts.update("B", 9);
        });
        assert!(matches!(err, Err(ResolveError::Core(_))));
        assert_eq!(program.version(), before);
        assert_eq!(program.document(doc).unwrap().to_string(), "A");
    }

    #[test]
    fn unknown_documents_are_errors() {
        let program = Program::default();
        assert_eq!(
            program.delete_document(DocumentId(7)),
            Err(ResolveError::DocumentNotFound { id: DocumentId(7) })
        );
    }

    #[test]
    fn structural_faults_follow_their_statements() {
        let program = Program::default();
        let doc = program
            .create_document(&uri("memory://a.strata"), "A\n/(/")
            .unwrap();
        assert_eq!(program.fault_count(), 1);
        assert_eq!(program.faults()[0].line, 1);

        program.edit(doc, |facts| {
            facts.insert("B", 0);
        })
        .unwrap();
        let faults = program.faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].kind, FaultKind::InvalidPattern);
        assert_eq!(faults[0].line, 2);
    }

    #[test]
    fn deleting_a_document_rectifies_its_faults() {
        let program = Program::default();
        let doc = program
            .create_document(&uri("memory://a.strata"), "A : Missing")
            .unwrap();
        assert_eq!(program.fault_count(), 1);
        program.delete_document(doc).unwrap();
        assert_eq!(program.fault_count(), 0);
        assert!(program.documents().is_empty());
    }
}
