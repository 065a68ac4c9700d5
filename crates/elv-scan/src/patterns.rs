use elv_types::Severity;
use once_cell::sync::Lazy;
use regex::Regex;

/// Replacement for matched spans in sanitized output.
pub const PLACEHOLDER: &str = "[BLOCKED]";

/// One entry in the threat table: a label for reporting, the severity it
/// carries, and the pattern that detects it.
#[derive(Clone, Debug)]
pub struct ThreatPattern {
    pub label: &'static str,
    pub severity: Severity,
    pub pattern: Regex,
}

impl ThreatPattern {
    fn new(label: &'static str, severity: Severity, pattern: &str) -> Self {
        Self {
            label,
            severity,
            pattern: Regex::new(pattern).expect("threat pattern must compile"),
        }
    }
}

/// The canonical threat table, in evaluation order.
///
/// Order matters only for the order of reported labels; the verdict severity
/// is the maximum across all matches. Severities:
///
/// - `Critical`: the write must be refused outright.
/// - `Medium` / `Low`: suspicious; callers decide between storing the
///   sanitized copy or the original with a warning.
pub static THREAT_TABLE: Lazy<Vec<ThreatPattern>> = Lazy::new(|| {
    vec![
        ThreatPattern::new(
            "instruction-override",
            Severity::Critical,
            r"(?i)\b(ignore|disregard|forget|override)\s+(all\s+|any\s+)?(previous|prior|above|earlier|your)\s+(instructions?|prompts?|rules?|directives?)",
        ),
        ThreatPattern::new(
            "prompt-exfiltration",
            Severity::Critical,
            r"(?i)\b(reveal|show|print|display|repeat|output)\s+(me\s+)?(your|the)\s+(system\s+prompt|initial\s+instructions?|hidden\s+(instructions?|prompts?))",
        ),
        ThreatPattern::new("script-tag", Severity::Critical, r"(?i)<\s*script\b"),
        ThreatPattern::new("nul-byte", Severity::Critical, r"\x00"),
        ThreatPattern::new(
            "role-hijack",
            Severity::Medium,
            r"(?i)\byou\s+are\s+now\s+(a|an|in)\b|\bpretend\s+(you\s+are|to\s+be)\b|\bact\s+as\s+if\s+you\s+(are|were)\b",
        ),
        ThreatPattern::new(
            "eval-fragment",
            Severity::Medium,
            r"(?i)\b(eval|exec|execfile)\s*\(",
        ),
        ThreatPattern::new("shell-substitution", Severity::Medium, r"\$\([^)\n]*\)"),
        ThreatPattern::new(
            "control-chars",
            Severity::Medium,
            r"[\x01-\x08\x0B\x0C\x0E-\x1F]{2,}",
        ),
        ThreatPattern::new(
            "zero-width",
            Severity::Medium,
            r"[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}]",
        ),
        // A Cyrillic letter touching an ASCII word is the common homoglyph
        // smuggle ("іgnore" with a Ukrainian i); all-Cyrillic text does not
        // trigger this.
        ThreatPattern::new(
            "homoglyph",
            Severity::Low,
            r"[A-Za-z][\u{0400}-\u{04FF}]|[\u{0400}-\u{04FF}][A-Za-z]",
        ),
    ]
});
