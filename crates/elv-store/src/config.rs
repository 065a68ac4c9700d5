use std::path::PathBuf;

use elv_meta::ParserLimits;

/// Configuration for an [`ElementStore`](crate::ElementStore).
///
/// The root directory is the single containment boundary: it must be an
/// existing, absolute directory, and nothing outside it is ever touched. No
/// environment-level configuration affects this layer.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Vault root; the path guard's boundary.
    pub root: PathBuf,
    /// Size and depth bounds for document parsing and rendering.
    pub limits: ParserLimits,
}

impl StoreConfig {
    /// Config for the given root with default limits.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            limits: ParserLimits::default(),
        }
    }

    /// Replace the parser limits.
    pub fn with_limits(mut self, limits: ParserLimits) -> Self {
        self.limits = limits;
        self
    }
}
