//! Lazily resolved references to other types.

use std::cell::OnceCell;
use std::rc::{Rc, Weak};

use strata_core::Uri;

use super::{upgrade_all, Type, TypeList};
use crate::error::ResolveError;
use crate::program::ProgramState;

/// A handle to the type at `uri`, resolved on first use.
#[derive(Debug, Clone)]
pub struct TypeProxy {
    uri: Uri,
    program: Weak<ProgramState>,
}

impl TypeProxy {
    /// Creates a proxy and marks `uri` as referenced in the type cache.
    pub(crate) fn new(uri: Uri, program: &Rc<ProgramState>) -> Self {
        program.types().borrow_mut().cache.reserve(uri.to_string());
        TypeProxy {
            uri,
            program: Rc::downgrade(program),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn resolve(&self) -> Result<Option<Rc<Type>>, ResolveError> {
        let program = self.program.upgrade().ok_or(ResolveError::ProgramDropped)?;
        Type::construct_in(&program, &self.uri)
    }
}

/// A list of proxies compiled into types at most once.
#[derive(Debug)]
pub struct TypeProxyArray {
    proxies: Vec<TypeProxy>,
    compiled: OnceCell<Vec<Weak<Type>>>,
}

impl TypeProxyArray {
    pub fn new(proxies: Vec<TypeProxy>) -> Self {
        TypeProxyArray {
            proxies,
            compiled: OnceCell::new(),
        }
    }

    /// Resolves every proxy on the first call. Proxies that resolve to
    /// nothing are left out.
    pub fn maybe_compile(&self) -> Result<TypeList, ResolveError> {
        if let Some(compiled) = self.compiled.get() {
            return upgrade_all(compiled);
        }
        let mut types = Vec::with_capacity(self.proxies.len());
        for proxy in &self.proxies {
            if let Some(ty) = proxy.resolve()? {
                types.push(ty);
            }
        }
        let _ = self.compiled.set(types.iter().map(Rc::downgrade).collect());
        Ok(types)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn uris(&self) -> impl Iterator<Item = &Uri> {
        self.proxies.iter().map(TypeProxy::uri)
    }
}
