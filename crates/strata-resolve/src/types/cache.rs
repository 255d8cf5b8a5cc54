//! Per-program type cache and construction worker registry.

use std::collections::HashMap;
use std::rc::Rc;

use strata_core::VersionStamp;

use super::Type;
use crate::worker::ConstructionWorker;

/// What the cache knows about one URI.
#[derive(Clone)]
pub enum Cached {
    Resolved(Rc<Type>),
    /// Referenced by a proxy but not built yet.
    Proxy,
    /// Confirmed to resolve to nothing.
    Absent,
}

/// Types keyed by URI text, valid for a single program version.
///
/// The whole cache is dropped as soon as a newer version is observed.
#[derive(Default)]
pub struct TypeCache {
    version: Option<VersionStamp>,
    entries: HashMap<String, Cached>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every entry if `version` is newer than the one the cache was
    /// filled under, and records `version`.
    pub fn refresh(&mut self, version: VersionStamp) {
        match self.version {
            Some(current) if !version.newer_than(current) => {}
            _ => {
                if !self.entries.is_empty() {
                    tracing::trace!(
                        entries = self.entries.len(),
                        version = %version,
                        "type cache cleared"
                    );
                }
                self.entries.clear();
                self.version = Some(version);
            }
        }
    }

    pub fn version(&self) -> Option<VersionStamp> {
        self.version
    }

    pub fn get(&self, key: &str) -> Option<&Cached> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: String, entry: Cached) {
        self.entries.insert(key, entry);
    }

    /// Marks `key` as referenced unless something is already known about it.
    pub fn reserve(&mut self, key: String) {
        self.entries.entry(key).or_insert(Cached::Proxy);
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The type cache and the live construction worker of one program.
#[derive(Default)]
pub struct TypeRegistry {
    pub cache: TypeCache,
    worker: Option<Rc<ConstructionWorker>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the worker for `version`, creating one with `make` when none
    /// exists or the current one was built for an older version.
    pub fn worker<F>(&mut self, version: VersionStamp, make: F) -> Rc<ConstructionWorker>
    where
        F: FnOnce() -> ConstructionWorker,
    {
        match &self.worker {
            Some(worker) if !version.newer_than(worker.version()) => Rc::clone(worker),
            _ => {
                let worker = Rc::new(make());
                self.worker = Some(Rc::clone(&worker));
                worker
            }
        }
    }
}
