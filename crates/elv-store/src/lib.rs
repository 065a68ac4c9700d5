//! Persistence façade for the Element Vault.
//!
//! This crate is the only entry point callers use to touch element files.
//! Every operation runs the same protective sequence:
//!
//! 1. **Path Guard** — the element's storage path is resolved and proven to
//!    live under the vault root ([`elv_guard`]).
//! 2. **Resource lock** — the operation acquires the FIFO lock for the
//!    element's [`ResourceKey`](elv_types::ResourceKey) ([`elv_lock`]), and
//!    holds it across the whole read-modify-write.
//! 3. **Validation** — reads go through the safe metadata parser
//!    ([`elv_meta`]); writes go through the threat scanner ([`elv_scan`]).
//! 4. **Atomic I/O** — all writes commit via write-temp/flush/rename, so a
//!    rejected or crashed write leaves the prior file state untouched.
//!
//! The lock table is injected at construction rather than being process-wide
//! state, so each test (and each embedding) owns its own.

pub mod config;
pub mod error;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::{ElementStore, ThreatPolicy, WriteOptions, WriteOutcome};
