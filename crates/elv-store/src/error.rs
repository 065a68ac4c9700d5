use elv_types::{ElementId, ElementKind, Severity};

/// Errors from façade operations.
///
/// All variants are terminal for the operation that raised them; nothing is
/// retried internally. Messages are safe to surface to users: they name the
/// element by kind and id, never by resolved filesystem path, and threat
/// rejections carry pattern labels rather than the matched text.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The identifier would resolve outside the vault root.
    #[error(transparent)]
    PathViolation(#[from] elv_guard::GuardError),

    /// The document's metadata header failed a safety check.
    #[error(transparent)]
    YamlSecurityViolation(#[from] elv_meta::MetaError),

    /// The content matched critical-severity threat patterns; the write was
    /// refused and the prior file state is unchanged.
    #[error("content threat detected ({severity}): {}", labels.join(", "))]
    ContentThreatDetected {
        severity: Severity,
        labels: Vec<String>,
    },

    /// The element already exists and overwriting was not allowed.
    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: ElementKind, id: ElementId },

    /// The element does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: ElementKind, id: ElementId },

    /// Underlying storage failure, surfaced unmodified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for façade operations.
pub type StoreResult<T> = Result<T, StoreError>;
