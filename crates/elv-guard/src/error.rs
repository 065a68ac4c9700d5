/// Errors from path guard construction and resolution.
///
/// Violations carry only the offending fragment of the input, never a full
/// resolved path outside the root; the reasons are safe to surface verbatim.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// The input would resolve outside the storage root, or contains a
    /// construct that could (traversal segment, absolute prefix, NUL,
    /// disallowed character).
    #[error("path violation: {reason}")]
    Violation { reason: String },

    /// The configured root is not an absolute path.
    #[error("storage root must be absolute")]
    RootNotAbsolute,

    /// The configured root does not exist or is not a directory.
    #[error("storage root is not an existing directory")]
    RootNotDirectory,

    /// Filesystem error while canonicalizing.
    #[error("I/O error during path resolution: {0}")]
    Io(#[from] std::io::Error),
}

impl GuardError {
    /// Shorthand for a violation with the given reason.
    pub fn violation(reason: impl Into<String>) -> Self {
        Self::Violation {
            reason: reason.into(),
        }
    }
}

/// Result alias for guard operations.
pub type GuardResult<T> = Result<T, GuardError>;
