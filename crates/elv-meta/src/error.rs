/// Errors from safe metadata parsing and rendering.
///
/// Every variant is terminal for the operation that triggered it: a document
/// that fails a safety check is never partially parsed.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// The document is not valid UTF-8.
    #[error("document is not valid UTF-8")]
    InvalidUtf8,

    /// The document does not start with the `---` marker line.
    #[error("document must start with a '---' marker line")]
    MissingOpeningMarker,

    /// The metadata header is never closed by a second `---` marker line.
    #[error("metadata header has no closing '---' marker line")]
    UnterminatedHeader,

    /// The whole document exceeds the configured size bound.
    #[error("document too large: {len} bytes (max {max})")]
    DocumentTooLarge { len: usize, max: usize },

    /// The metadata header exceeds the configured size bound.
    #[error("metadata header too large: {len} bytes (max {max})")]
    MetadataTooLarge { len: usize, max: usize },

    /// The header uses a YAML construct this parser forbids.
    #[error("unsafe metadata construct: {construct}")]
    UnsafeConstruct { construct: String },

    /// Metadata nesting exceeds the configured depth bound.
    #[error("metadata nesting deeper than {max} levels")]
    DepthExceeded { max: usize },

    /// A reserved prototype-like key appeared in the header.
    #[error("reserved metadata key: {0:?}")]
    ReservedKey(String),

    /// A mapping key is not a plain string.
    #[error("metadata keys must be plain strings")]
    NonStringKey,

    /// The header is not a mapping at the top level.
    #[error("metadata header must be a key/value mapping")]
    TopLevelNotMapping,

    /// A recognized field holds a value of the wrong shape.
    #[error("metadata field {key:?} must be {expected}")]
    InvalidFieldType {
        key: &'static str,
        expected: &'static str,
    },

    /// The header is not well-formed YAML.
    #[error("malformed metadata header: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result alias for metadata operations.
pub type MetaResult<T> = Result<T, MetaError>;
