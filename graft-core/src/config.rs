//! Session-level mapping configuration.

use crate::mapper::Depth;

/// How the compiler groups builders into statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Batching {
    /// One statement per label signature (nodes) or relationship type.
    #[default]
    ByShape,
    /// One statement per builder.
    PerRow,
}

/// Defaults applied by a session when the caller does not pass them.
///
/// ```rust
/// use graft_core::config::{Batching, MappingConfig};
/// use graft_core::mapper::Depth;
///
/// let config = MappingConfig::default()
///     .default_depth(Depth::Limited(2))
///     .batching(Batching::PerRow);
/// assert_eq!(config.depth(), Depth::Limited(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MappingConfig {
    default_depth: Depth,
    batching: Batching,
}

impl MappingConfig {
    pub fn default_depth(mut self, depth: impl Into<Depth>) -> Self {
        self.default_depth = depth.into();
        self
    }

    pub fn batching(mut self, batching: Batching) -> Self {
        self.batching = batching;
        self
    }

    pub fn depth(&self) -> Depth {
        self.default_depth
    }

    pub fn batching_mode(&self) -> Batching {
        self.batching
    }
}
