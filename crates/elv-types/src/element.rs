use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum byte length of an element identifier.
pub const MAX_ID_LEN: usize = 255;

/// The four element categories managed by the vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Persona,
    Skill,
    Template,
    Agent,
}

impl ElementKind {
    /// Singular lowercase name, used in resource keys and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persona => "persona",
            Self::Skill => "skill",
            Self::Template => "template",
            Self::Agent => "agent",
        }
    }

    /// Storage subdirectory for this kind, relative to the vault root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Persona => "personas",
            Self::Skill => "skills",
            Self::Template => "templates",
            Self::Agent => "agents",
        }
    }

    /// All kinds, in a fixed order.
    pub fn all() -> [ElementKind; 4] {
        [Self::Persona, Self::Skill, Self::Template, Self::Agent]
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "persona" => Ok(Self::Persona),
            "skill" => Ok(Self::Skill),
            "template" => Ok(Self::Template),
            "agent" => Ok(Self::Agent),
            other => Err(TypeError::UnknownKind(other.to_string())),
        }
    }
}

/// Validated element identifier.
///
/// An `ElementId` is the user-facing name of an element (a slug such as
/// `creative-writer` or `code-review.v2`). Validation guarantees the id is
/// safe to render as a single path component: ASCII alphanumerics, `-`, `_`
/// and `.` only, no `..` sequence, no NUL, no separators, bounded length.
///
/// The id is never used as a path directly; callers still pass it through the
/// path guard, which re-checks containment against the vault root.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ElementId(String);

impl ElementId {
    /// Validate and wrap an identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use elv_types::ElementId;
    ///
    /// assert!(ElementId::parse("creative-writer").is_ok());
    /// assert!(ElementId::parse("../escape").is_err());
    /// assert!(ElementId::parse("").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() {
            return Err(invalid(s, "must not be empty"));
        }
        if s.len() > MAX_ID_LEN {
            return Err(invalid(s, format!("longer than {MAX_ID_LEN} bytes")));
        }

        let first = s.chars().next().expect("non-empty");
        if !first.is_ascii_alphanumeric() {
            return Err(invalid(s, "must start with an ASCII letter or digit"));
        }

        for ch in s.chars() {
            if !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.') {
                return Err(invalid(s, format!("contains forbidden character: {ch:?}")));
            }
        }

        // `..` never appears in a well-formed slug and is the classic
        // traversal marker, so reject it outright even though the guard
        // would also catch it.
        if s.contains("..") {
            return Err(invalid(s, "must not contain '..'"));
        }

        if s.ends_with('.') {
            return Err(invalid(s, "must not end with '.'"));
        }

        Ok(Self(s.to_string()))
    }

    /// The validated identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn invalid(id: &str, reason: impl Into<String>) -> TypeError {
    // Truncate what we echo back; a hostile "identifier" can be arbitrarily
    // long and we never reflect more than a prefix of it.
    let mut shown: String = id.chars().take(64).collect();
    if shown.len() < id.len() {
        shown.push_str("...");
    }
    TypeError::InvalidElementId {
        id: shown,
        reason: reason.into(),
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({:?})", self.0)
    }
}

impl FromStr for ElementId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ElementId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ElementId> for String {
    fn from(id: ElementId) -> Self {
        id.0
    }
}
