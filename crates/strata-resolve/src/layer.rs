//! Layers: one per URI prefix, each holding the seed parallel at that depth.

use std::fmt;

use strata_core::Uri;

use crate::parallel::ParallelId;

/// Index of a layer in its layer context's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The parallels rooted at one depth of a URI's type path.
#[derive(Debug, Clone)]
pub struct Layer {
    pub id: LayerId,
    pub uri: Uri,
    /// The layer one type component up, if any.
    pub container: Option<LayerId>,
    /// The parallel at this layer's URI. `None` while the layer is being
    /// built, and afterwards when nothing exists at that URI.
    pub seed: Option<ParallelId>,
}
