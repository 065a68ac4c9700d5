use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a threat-scanner match.
///
/// Ordered: `None < Low < Medium < Critical`. A verdict takes the highest
/// severity among all matches.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Structured judgment of a piece of text by the threat scanner.
///
/// Invariants:
/// - `severity == Critical` implies `is_valid == false`;
/// - `sanitized_text` is always populated, even for invalid verdicts, so
///   callers can choose between rejecting and storing a neutralized copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatVerdict {
    pub is_valid: bool,
    pub severity: Severity,
    /// Labels of matched patterns, in pattern-table order, deduplicated.
    pub matched_patterns: Vec<String>,
    /// The input with every matched span replaced by a neutral placeholder.
    pub sanitized_text: String,
}

impl ThreatVerdict {
    /// A clean verdict: nothing matched, text passes through untouched.
    pub fn clean(text: &str) -> Self {
        Self {
            is_valid: true,
            severity: Severity::None,
            matched_patterns: Vec::new(),
            sanitized_text: text.to_string(),
        }
    }
}
