use crate::metadata::MetadataBlock;

/// An element document: metadata header plus free-form body.
///
/// Documents are replaced wholesale on every edit; no partial in-place
/// metadata mutation is trusted. The whole document is re-rendered and
/// re-validated by the persistence layer on each write.
#[derive(Clone, Debug, Default)]
pub struct Document {
    /// Parsed metadata header.
    pub metadata: MetadataBlock,
    /// Everything after the closing header marker, unrestricted.
    pub body: String,
    /// Original on-disk bytes, kept for round-trip diagnostics. `None` for
    /// documents built in memory. Excluded from equality.
    pub raw: Option<Vec<u8>>,
}

impl Document {
    /// Build an in-memory document (no raw bytes).
    pub fn new(metadata: MetadataBlock, body: impl Into<String>) -> Self {
        Self {
            metadata,
            body: body.into(),
            raw: None,
        }
    }
}

/// Equality ignores `raw`: two documents are the same document if their
/// metadata and body agree, regardless of byte-level formatting on disk.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata && self.body == other.body
    }
}
