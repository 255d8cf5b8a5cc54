//! Program configuration.

use serde::{Deserialize, Serialize};

/// Options controlling how a program resolves types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramOptions {
    /// Resolve every declared node inside each edit transaction, so that
    /// resolution faults are diffed together with the edit.
    pub eager_verification: bool,

    /// Deepest type path a URI may request. Deeper URIs resolve to nothing.
    pub max_layer_depth: usize,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        ProgramOptions {
            eager_verification: true,
            max_layer_depth: 64,
        }
    }
}
