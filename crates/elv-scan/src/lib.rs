//! Threat scanning for the Element Vault.
//!
//! Element bodies and metadata come from users and, via the registry, from
//! the network. Before anything is written to disk it is evaluated against a
//! curated table of threat patterns: instruction-override phrasing, prompt
//! exfiltration, embedded executable fragments, control-character runs, and
//! the obfuscation tricks (zero-width characters, homoglyphs) used to smuggle
//! those past naive filters.
//!
//! Scanning is pattern matching only. Nothing in the scanned text is ever
//! executed, and identical input always produces an identical
//! [`ThreatVerdict`](elv_types::ThreatVerdict).

pub mod patterns;
pub mod scanner;

pub use patterns::{ThreatPattern, PLACEHOLDER};
pub use scanner::ThreatScanner;
