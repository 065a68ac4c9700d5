//! Path containment guard for the Element Vault.
//!
//! Every file the vault touches is addressed by a caller-supplied relative
//! identifier. This crate resolves such identifiers against a single
//! configured root directory and refuses any resolution that would land
//! outside it: traversal segments, absolute prefixes, NUL bytes, characters
//! outside a strict allow-list, and symlinks that point out of the root.
//!
//! If a [`ResolvedPath`] value exists, it was produced by the guard and is
//! contained in the root by construction. No other crate can build one.

pub mod error;
pub mod guard;

pub use error::{GuardError, GuardResult};
pub use guard::{PathGuard, ResolvedPath};
