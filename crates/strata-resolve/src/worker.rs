//! The construction worker: one layer context bound to one program version.

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use strata_core::{DocumentGraph, Uri, VersionStamp};
use strata_faults::FaultSink;

use crate::context::LayerContext;
use crate::error::ResolveError;
use crate::parallel::ParallelId;

/// Owns the layer context for a single program version.
///
/// Types keep a handle to the worker that built them, so the shadow graph
/// they were read from stays alive until the last of them is dropped.
pub struct ConstructionWorker {
    version: VersionStamp,
    context: RefCell<LayerContext>,
}

impl ConstructionWorker {
    pub fn new(
        version: VersionStamp,
        graph: Rc<DocumentGraph>,
        sink: Weak<dyn FaultSink>,
        max_depth: usize,
    ) -> Self {
        tracing::debug!(version = %version, "construction worker created");
        ConstructionWorker {
            version,
            context: RefCell::new(LayerContext::new(graph, sink, max_depth)),
        }
    }

    pub fn version(&self) -> VersionStamp {
        self.version
    }

    /// Builds the layers along `uri` and returns the seed parallel at its
    /// full type path.
    pub fn drill(&self, uri: &Uri) -> Result<Option<ParallelId>, ResolveError> {
        let mut context = self.context.borrow_mut();
        let layer = context.maybe_construct(uri)?;
        Ok(layer.and_then(|l| context.layer(l).seed))
    }

    /// Borrows the layer context for reading.
    ///
    /// # Panics
    ///
    /// Panics if called while a `drill` on the same worker is running.
    pub fn context(&self) -> Ref<'_, LayerContext> {
        self.context.borrow()
    }
}
