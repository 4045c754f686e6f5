//! Session options, loadable from TOML.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default bound on the explicit expression worklist.
pub const DEFAULT_MAX_DEPTH: usize = 1 << 20;
/// Default bound on function definitions nested through call nodes.
pub const DEFAULT_MAX_FUNCTION_NESTING: usize = 64;

/// Configuration options supplied when opening a serialization session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Maximum number of simultaneously open expression definitions.
    pub max_depth: usize,
    /// Maximum number of function definitions nested inside one another.
    pub max_function_nesting: usize,
    /// Whether described packing logs values at trace level.
    pub trace_values: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_function_nesting: DEFAULT_MAX_FUNCTION_NESTING,
            trace_values: false,
        }
    }
}

impl SessionOptions {
    /// Parses options from a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        Ok(toml::from_str(src)?)
    }

    /// Sets the maximum expression nesting depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the maximum function nesting depth.
    pub fn max_function_nesting(mut self, depth: usize) -> Self {
        self.max_function_nesting = depth;
        self
    }

    /// Enables or disables value tracing for described packing.
    pub fn trace_values(mut self, enabled: bool) -> Self {
        self.trace_values = enabled;
        self
    }
}
