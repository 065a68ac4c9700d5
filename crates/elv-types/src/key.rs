use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::{ElementId, ElementKind};

/// Namespaced lock key for one logical element: `"<kind>:<id>"`.
///
/// Identical logical resources always normalize to the same key: the id part
/// is case-folded, so `Alpha` and `alpha` contend for the same lock. Ids are
/// ASCII by construction (see [`ElementId::parse`]), which makes ASCII
/// case-folding a complete normalization.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Build the key for an element.
    pub fn element(kind: ElementKind, id: &ElementId) -> Self {
        Self(format!("{}:{}", kind.as_str(), id.as_str().to_ascii_lowercase()))
    }

    /// The normalized key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceKey({:?})", self.0)
    }
}
