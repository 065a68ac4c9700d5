//! Foundation types for the Element Vault.
//!
//! This crate provides the identifier, metadata, and verdict types used
//! throughout the vault. Every other `elv-*` crate depends on `elv-types`.
//!
//! # Key Types
//!
//! - [`ElementKind`] — The four element categories (persona, skill, template, agent)
//! - [`ElementId`] — Validated, filesystem-safe element identifier
//! - [`ResourceKey`] — Namespaced lock key (`"<kind>:<id>"`, case-folded)
//! - [`MetadataBlock`] — Typed metadata header with a bounded extra-field bag
//! - [`Document`] — Metadata plus body, the unit of storage
//! - [`ThreatVerdict`] — Structured judgment produced by the threat scanner

pub mod document;
pub mod element;
pub mod error;
pub mod key;
pub mod metadata;
pub mod verdict;

pub use document::Document;
pub use element::{ElementId, ElementKind};
pub use error::TypeError;
pub use key::ResourceKey;
pub use metadata::{is_reserved_key, MetaValue, MetadataBlock, RESERVED_KEYS};
pub use verdict::{Severity, ThreatVerdict};
