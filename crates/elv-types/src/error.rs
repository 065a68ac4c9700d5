/// Errors from foundation type construction and parsing.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// The identifier failed validation.
    #[error("invalid element id {id:?}: {reason}")]
    InvalidElementId { id: String, reason: String },

    /// The string does not name a known element kind.
    #[error("unknown element kind: {0:?}")]
    UnknownKind(String),

    /// A metadata key is reserved and may not be used.
    #[error("reserved metadata key: {0:?}")]
    ReservedKey(String),
}
