//! The Type facade.
//!
//! A [`Type`] is a read-only view of one seed parallel, materialized for a
//! single program version. Types are constructed through
//! [`Type::construct`], cached per program by URI text, and become dirty as
//! soon as the program version advances: every derived accessor then fails
//! with [`ResolveError::Dirty`] and the caller must construct again.
//!
//! Derived accessors are computed once and memoized. Memos hold weak
//! references; the cache keeps every type of the current version alive.

pub mod cache;
pub mod proxy;

use std::cell::OnceCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use strata_core::statement::LIST_SUFFIX;
use strata_core::{DocumentGraph, DocumentId, NodeId, Uri, VersionStamp};

use crate::error::ResolveError;
use crate::parallel::ParallelId;
use crate::program::{Program, ProgramState};
use crate::worker::ConstructionWorker;
use cache::Cached;
use proxy::{TypeProxy, TypeProxyArray};

pub type TypeList = Vec<Rc<Type>>;

/// One step of [`Type::iterate`].
#[derive(Debug, Clone)]
pub struct Visit {
    pub ty: Rc<Type>,
    /// The type whose `next` relation produced `ty`.
    pub via: Option<Rc<Type>>,
}

#[derive(Default)]
struct Memo {
    parallel_roots: OnceCell<Vec<Weak<Type>>>,
    contents: OnceCell<Vec<Weak<Type>>>,
    contents_intrinsic: OnceCell<Vec<Weak<Type>>>,
    superordinates: OnceCell<Vec<Weak<Type>>>,
    subordinates: OnceCell<Vec<Weak<Type>>>,
    derivations: OnceCell<Vec<Weak<Type>>>,
    adjacents: OnceCell<Vec<Weak<Type>>>,
    patterns: OnceCell<Vec<Weak<Type>>>,
    values: OnceCell<Vec<String>>,
}

pub struct Type {
    name: String,
    uri: Uri,
    key: String,
    seed: ParallelId,
    node: Option<NodeId>,
    container: Option<Rc<Type>>,
    stamp: VersionStamp,
    program: Weak<ProgramState>,
    worker: Rc<ConstructionWorker>,
    parallels: TypeProxyArray,
    bases: TypeProxyArray,
    is_pattern: bool,
    is_uri: bool,
    is_anonymous: bool,
    is_specified: bool,
    is_fresh: bool,
    is_list: bool,
    memo: Memo,
}

pub(crate) fn upgrade_all(weak: &[Weak<Type>]) -> Result<TypeList, ResolveError> {
    weak.iter()
        .map(|w| w.upgrade().ok_or(ResolveError::ProgramDropped))
        .collect()
}

fn memo<F>(cell: &OnceCell<Vec<Weak<Type>>>, compute: F) -> Result<TypeList, ResolveError>
where
    F: FnOnce() -> Result<TypeList, ResolveError>,
{
    if let Some(stored) = cell.get() {
        return upgrade_all(stored);
    }
    let computed = compute()?;
    let _ = cell.set(computed.iter().map(Rc::downgrade).collect());
    Ok(computed)
}

fn dedup_by_key(types: TypeList) -> TypeList {
    let mut seen: HashSet<String> = HashSet::new();
    types
        .into_iter()
        .filter(|t| seen.insert(t.key.clone()))
        .collect()
}

impl Type {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Returns the type at `uri`, or `None` if the URI has no type path or
    /// nothing resolves there.
    pub fn construct(program: &Program, uri: &Uri) -> Result<Option<Rc<Type>>, ResolveError> {
        Self::construct_in(program.state(), uri)
    }

    /// Returns the types of the root declarations of `document`.
    pub fn construct_roots(
        program: &Program,
        document: DocumentId,
    ) -> Result<TypeList, ResolveError> {
        let graph = program.graph();
        let mut out = Vec::new();
        for node in graph.read_roots(document) {
            if let Some(ty) = Self::construct_in(program.state(), &graph.node(node).uri)? {
                out.push(ty);
            }
        }
        Ok(out)
    }

    pub(crate) fn construct_in(
        state: &Rc<ProgramState>,
        uri: &Uri,
    ) -> Result<Option<Rc<Type>>, ResolveError> {
        let result = Self::materialize(state, uri);
        if !state.is_editing() {
            state.hooks().flush();
        }
        result
    }

    fn materialize(state: &Rc<ProgramState>, uri: &Uri) -> Result<Option<Rc<Type>>, ResolveError> {
        if uri.depth() == 0 {
            return Ok(None);
        }
        let key = uri.to_string();
        let version = state.version();
        {
            let mut types = state.types().borrow_mut();
            types.cache.refresh(version);
            match types.cache.get(&key) {
                Some(Cached::Resolved(ty)) => {
                    tracing::trace!(uri = %key, "type cache hit");
                    return Ok(Some(Rc::clone(ty)));
                }
                Some(Cached::Absent) => return Ok(None),
                Some(Cached::Proxy) | None => {}
            }
        }

        let worker = state.worker();
        let Some(seed) = worker.drill(uri)? else {
            state.types().borrow_mut().cache.set(key, Cached::Absent);
            return Ok(None);
        };

        let lineage = worker.context().lineage(seed);
        let mut last: Option<Rc<Type>> = None;
        for parallel in lineage {
            let key = worker.context().parallel(parallel).uri().to_string();
            let cached = state.types().borrow().cache.get(&key).cloned();
            let ty = match cached {
                Some(Cached::Resolved(ty)) => ty,
                Some(Cached::Absent) => {
                    return Err(ResolveError::unknown_state(format!(
                        "'{key}' is cached as absent but has a parallel"
                    )));
                }
                Some(Cached::Proxy) | None => {
                    let ty = Rc::new(Type::new(state, &worker, parallel, last.take(), version));
                    state
                        .types()
                        .borrow_mut()
                        .cache
                        .set(key, Cached::Resolved(Rc::clone(&ty)));
                    ty
                }
            };
            last = Some(ty);
        }
        Ok(last)
    }

    fn new(
        state: &Rc<ProgramState>,
        worker: &Rc<ConstructionWorker>,
        seed: ParallelId,
        container: Option<Rc<Type>>,
        stamp: VersionStamp,
    ) -> Type {
        let context = worker.context();
        let parallel = context.parallel(seed);
        let uri = parallel.uri().clone();
        let parallel_uris: Vec<Uri> = parallel
            .parallels()
            .iter()
            .map(|id| context.parallel(*id).uri().clone())
            .collect();
        let base_uris = context.base_uris(seed);
        let node = parallel.as_specified().map(|sp| sp.node);
        let (is_pattern, is_uri, is_anonymous) = node
            .map(|n| {
                let n = context.graph().node(n);
                (n.is_pattern(), n.is_uri(), n.is_anonymous())
            })
            .unwrap_or_default();
        drop(context);

        let name = uri.type_name().unwrap_or_default().to_string();
        tracing::debug!(uri = %uri, specified = node.is_some(), "type materialized");

        Type {
            is_list: name.ends_with(LIST_SUFFIX),
            is_fresh: node.is_some() && parallel_uris.is_empty(),
            is_specified: node.is_some(),
            is_pattern,
            is_uri,
            is_anonymous,
            key: uri.to_string(),
            name,
            uri,
            seed,
            node,
            container,
            stamp,
            program: Rc::downgrade(state),
            worker: Rc::clone(worker),
            parallels: TypeProxyArray::new(
                parallel_uris
                    .into_iter()
                    .map(|u| TypeProxy::new(u, state))
                    .collect(),
            ),
            bases: TypeProxyArray::new(
                base_uris
                    .into_iter()
                    .map(|u| TypeProxy::new(u, state))
                    .collect(),
            ),
            memo: Memo::default(),
        }
    }

    // ------------------------------------------------------------------
    // Identity and flags
    // ------------------------------------------------------------------

    /// The last type component of the URI. For patterns this is the pattern
    /// text, slashes included.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The type one level up, or `None` at the document root.
    pub fn container(&self) -> Option<&Rc<Type>> {
        self.container.as_ref()
    }

    pub fn is_pattern(&self) -> bool {
        self.is_pattern
    }

    pub fn is_uri(&self) -> bool {
        self.is_uri
    }

    pub fn is_anonymous(&self) -> bool {
        self.is_anonymous
    }

    /// `true` if declared in a document, `false` if inferred from parallels.
    pub fn is_specified(&self) -> bool {
        self.is_specified
    }

    /// `true` for a declared type that overrides nothing.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh
    }

    pub fn is_list(&self) -> bool {
        self.is_list
    }

    /// `true` once the owning program has moved past the version this type
    /// was built under, or was dropped.
    pub fn is_dirty(&self) -> bool {
        match self.program.upgrade() {
            Some(program) => program.version().newer_than(self.stamp),
            None => true,
        }
    }

    fn check(&self) -> Result<Rc<ProgramState>, ResolveError> {
        let program = self.program.upgrade().ok_or(ResolveError::ProgramDropped)?;
        if program.version().newer_than(self.stamp) {
            return Err(ResolveError::Dirty {
                uri: self.key.clone(),
            });
        }
        Ok(program)
    }

    fn graph(&self) -> Rc<DocumentGraph> {
        Rc::clone(self.worker.context().graph())
    }

    // ------------------------------------------------------------------
    // Derived accessors
    // ------------------------------------------------------------------

    /// The types this one overrides: the same member declared in the
    /// container's parallels and bases.
    pub fn parallels(&self) -> Result<TypeList, ResolveError> {
        self.check()?;
        self.parallels.maybe_compile()
    }

    /// The types this one extends, patterns included.
    pub fn bases(&self) -> Result<TypeList, ResolveError> {
        self.check()?;
        self.bases.maybe_compile()
    }

    /// The endpoints of the parallel graph above this type.
    pub fn parallel_roots(self: &Rc<Self>) -> Result<TypeList, ResolveError> {
        self.check()?;
        memo(&self.memo.parallel_roots, || {
            let mut roots = Vec::new();
            for visit in self.iterate(|t| t.parallels(), true)? {
                if visit.ty.key != self.key && visit.ty.parallels.is_empty() {
                    roots.push(visit.ty);
                }
            }
            Ok(roots)
        })
    }

    /// The members of this type, declared here or inherited through the
    /// parallel and base graphs. Excludes a list's intrinsic members.
    pub fn contents(self: &Rc<Self>) -> Result<TypeList, ResolveError> {
        let program = self.check()?;
        memo(&self.memo.contents, || {
            let graph = self.graph();
            let mut names: IndexSet<String> = IndexSet::new();
            for parallel in self.iterate(|t| t.parallels(), true)? {
                for base in parallel.ty.iterate(|t| t.bases(), true)? {
                    if let Some(node) = base.ty.node {
                        names.extend(graph.node(node).contents.keys().cloned());
                    }
                }
            }

            let mut out = Vec::new();
            for name in names {
                if let Some(ty) = Self::construct_in(&program, &self.uri.extend_type(&name))? {
                    out.push(ty);
                }
            }
            Ok(out)
        })
    }

    /// For a list, the members of its element types: the union of the
    /// contents of its bases. Empty for anything else.
    pub fn contents_intrinsic(self: &Rc<Self>) -> Result<TypeList, ResolveError> {
        self.check()?;
        memo(&self.memo.contents_intrinsic, || {
            if !self.is_list {
                return Ok(Vec::new());
            }
            let mut out = Vec::new();
            for base in self.bases()? {
                out.extend(base.contents()?);
            }
            Ok(dedup_by_key(out))
        })
    }

    /// Every type reachable through parallels and bases, pre-order, without
    /// this one.
    pub fn superordinates(self: &Rc<Self>) -> Result<TypeList, ResolveError> {
        self.check()?;
        memo(&self.memo.superordinates, || {
            let visits = self.iterate(
                |t| {
                    let mut next = t.parallels()?;
                    next.extend(t.bases()?);
                    Ok(next)
                },
                false,
            )?;
            Ok(visits
                .into_iter()
                .map(|v| v.ty)
                .filter(|t| t.key != self.key)
                .collect())
        })
    }

    /// Every type that derives from this one, transitively, without this
    /// one.
    pub fn subordinates(self: &Rc<Self>) -> Result<TypeList, ResolveError> {
        self.check()?;
        memo(&self.memo.subordinates, || {
            let visits = self.iterate(|t| t.derivations(), false)?;
            Ok(visits
                .into_iter()
                .map(|v| v.ty)
                .filter(|t| t.key != self.key)
                .collect())
        })
    }

    /// The types that name this one as a base. Types that reach it only
    /// through an alias are excluded.
    pub fn derivations(&self) -> Result<TypeList, ResolveError> {
        let program = self.check()?;
        memo(&self.memo.derivations, || {
            let Some(node) = self.node else {
                return Ok(Vec::new());
            };
            let graph = self.graph();
            let mut out = Vec::new();
            for edge in graph.inbounds(node) {
                let hyper = graph.edge(edge);
                if hyper.aliased {
                    continue;
                }
                let uri = &graph.node(hyper.predecessor).uri;
                let Some(ty) = Self::construct_in(&program, uri)? else {
                    continue;
                };
                if ty.bases()?.iter().any(|b| b.key == self.key) {
                    out.push(ty);
                }
            }
            Ok(dedup_by_key(out))
        })
    }

    /// The types sharing this one's container, or the other document roots
    /// for a root type.
    pub fn adjacents(&self) -> Result<TypeList, ResolveError> {
        let program = self.check()?;
        memo(&self.memo.adjacents, || {
            let siblings = match &self.container {
                Some(container) => container.contents()?,
                None => {
                    let graph = self.graph();
                    let Some(document) = graph.document_by_uri(&self.uri.document_uri()) else {
                        return Ok(Vec::new());
                    };
                    let mut roots = Vec::new();
                    for node in document.roots.values() {
                        if let Some(ty) = Self::construct_in(&program, &graph.node(*node).uri)? {
                            roots.push(ty);
                        }
                    }
                    roots
                }
            };
            Ok(siblings.into_iter().filter(|t| t.key != self.key).collect())
        })
    }

    /// The patterns that resolve to this type, searched from this level
    /// outward. At each level only the first pattern per distinct base set
    /// is kept.
    pub fn patterns(self: &Rc<Self>) -> Result<TypeList, ResolveError> {
        self.check()?;
        memo(&self.memo.patterns, || {
            let mut by_bases: IndexMap<String, Rc<Type>> = IndexMap::new();
            let levels = self.iterate(|t| Ok(t.container.iter().cloned().collect()), false)?;
            for level in levels {
                for adjacent in level.ty.adjacents()? {
                    if !adjacent.is_pattern {
                        continue;
                    }
                    let bases = adjacent.bases()?;
                    if !bases.iter().any(|b| b.key == level.ty.key) {
                        continue;
                    }
                    let label = bases
                        .iter()
                        .map(|b| b.key.as_str())
                        .collect::<Vec<_>>()
                        .join("\n");
                    by_bases.entry(label).or_insert(adjacent);
                }
            }
            Ok(by_bases.into_values().collect())
        })
    }

    /// The alias texts this type is annotated with. For inferred types the
    /// parallel graph is searched.
    pub fn values(&self) -> Result<Vec<String>, ResolveError> {
        self.check()?;
        if let Some(values) = self.memo.values.get() {
            return Ok(values.clone());
        }
        let values = self.worker.context().aliases(self.seed);
        let _ = self.memo.values.set(values.clone());
        Ok(values)
    }

    /// The first alias, if any.
    pub fn value(&self) -> Result<Option<String>, ResolveError> {
        Ok(self.values()?.into_iter().next())
    }

    pub fn is_override(&self) -> Result<bool, ResolveError> {
        Ok(!self.parallels()?.is_empty())
    }

    pub fn is_introduction(&self) -> Result<bool, ResolveError> {
        Ok(self.parallels()?.is_empty())
    }

    // ------------------------------------------------------------------
    // Traversal and queries
    // ------------------------------------------------------------------

    /// Depth-first traversal from this type along `next`, yielding each
    /// type once. With `reverse`, a type is yielded after everything
    /// reachable from it (post-order); otherwise before (pre-order).
    pub fn iterate<F>(
        self: &Rc<Self>,
        mut next: F,
        reverse: bool,
    ) -> Result<Vec<Visit>, ResolveError>
    where
        F: FnMut(&Rc<Type>) -> Result<TypeList, ResolveError>,
    {
        enum Step {
            Enter(Rc<Type>, Option<Rc<Type>>),
            Exit(Visit),
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![Step::Enter(Rc::clone(self), None)];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(ty, via) => {
                    if !visited.insert(ty.key.clone()) {
                        continue;
                    }
                    let visit = Visit {
                        ty: Rc::clone(&ty),
                        via,
                    };
                    if reverse {
                        stack.push(Step::Exit(visit));
                    } else {
                        out.push(visit);
                    }
                    for following in next(&ty)?.into_iter().rev() {
                        stack.push(Step::Enter(following, Some(Rc::clone(&ty))));
                    }
                }
                Step::Exit(visit) => out.push(visit),
            }
        }
        Ok(out)
    }

    /// [`Type::iterate`] without the `via` links.
    pub fn visit<F>(self: &Rc<Self>, next: F, reverse: bool) -> Result<TypeList, ResolveError>
    where
        F: FnMut(&Rc<Type>) -> Result<TypeList, ResolveError>,
    {
        Ok(self
            .iterate(next, reverse)?
            .into_iter()
            .map(|v| v.ty)
            .collect())
    }

    /// Returns the member at `path` below this type. An empty path, or a
    /// path with a missing component, returns `None`.
    pub fn query<S: AsRef<str>>(
        self: &Rc<Self>,
        path: &[S],
    ) -> Result<Option<Rc<Type>>, ResolveError> {
        if path.is_empty() {
            return Ok(None);
        }
        let mut current = Rc::clone(self);
        for name in path {
            let found = current
                .contents()?
                .into_iter()
                .find(|t| t.name == name.as_ref());
            match found {
                Some(ty) => current = ty,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Checks whether `base` is this type or appears anywhere in its base
    /// graph.
    pub fn is(self: &Rc<Self>, base: &Type) -> Result<bool, ResolveError> {
        Ok(self
            .iterate(|t| t.bases(), false)?
            .iter()
            .any(|v| v.ty.key == base.key))
    }

    /// Checks whether `member` is among the contents of this type, directly
    /// or through the parallel graph of a same-named member.
    pub fn has(self: &Rc<Self>, member: &Type) -> Result<bool, ResolveError> {
        let contents = self.contents()?;
        if contents.iter().any(|t| t.key == member.key) {
            return Ok(true);
        }
        for contained in contents.iter().filter(|t| t.name == member.name) {
            let parallels = contained.iterate(|t| t.parallels(), false)?;
            if parallels.iter().any(|v| v.ty.key == member.key) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.stamp == other.stamp
    }
}

impl Eq for Type {}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type")
            .field("uri", &self.key)
            .field("specified", &self.is_specified)
            .field("stamp", &self.stamp)
            .finish()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}
