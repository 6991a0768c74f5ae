//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for a [`Runtime`](crate::reactive::Runtime).
///
/// All fields have defaults, so a partial JSON document such as
/// `{"flush_limit": 10000}` deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Node slots to pre-allocate.
    pub node_capacity: usize,

    /// Edge slots to pre-allocate.
    pub link_capacity: usize,

    /// Maximum number of effect runs in one flush. `None` means unbounded.
    pub flush_limit: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            node_capacity: 64,
            link_capacity: 128,
            flush_limit: None,
        }
    }
}

impl RuntimeConfig {
    /// Set the flush limit.
    pub fn with_flush_limit(mut self, limit: usize) -> Self {
        self.flush_limit = Some(limit);
        self
    }

    /// Check that the configuration can be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_limit == Some(0) {
            return Err(ConfigError::ZeroFlushLimit);
        }
        Ok(())
    }
}
