//! Safe metadata header parsing for the Element Vault.
//!
//! Element documents are stored as a YAML frontmatter header between `---`
//! marker lines, followed by a free-form body. This crate splits and parses
//! that format under a restricted mode that exists for safety, not schema:
//!
//! - anchors, aliases, merge keys, custom tags and directives are rejected
//!   before any YAML parsing happens (the classic expansion-bomb vectors);
//! - document and header sizes are bounded before allocation;
//! - nesting depth is bounded;
//! - reserved prototype-like keys (`__proto__`, `constructor`, `prototype`)
//!   are rejected at every nesting level.
//!
//! Business schema (required fields, defaults) is the caller's concern.
//! [`SafeParser::render`] is the inverse of [`SafeParser::parse`] for any
//! document within these bounds: `parse(&render(d)?)? == d`.

pub mod convert;
mod emit;
pub mod error;
pub mod parser;

pub use error::{MetaError, MetaResult};
pub use parser::{ParserLimits, SafeParser};
