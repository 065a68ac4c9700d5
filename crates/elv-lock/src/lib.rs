//! Named mutual exclusion and atomic file writes for the Element Vault.
//!
//! Two primitives live here:
//!
//! - [`LockTable`] — in-process, per-resource-key FIFO locks. `acquire` is
//!   the only suspension point in the vault; a caller waits only while
//!   another in-flight operation holds the same key. Release is guaranteed
//!   on every exit path via the handle's drop, including panics.
//! - [`atomic_write`] — write-temp, flush, sync, rename. A crash before the
//!   rename leaves the destination untouched; after the rename the new
//!   content is fully visible. No concurrent reader ever observes a torn
//!   file.
//!
//! The persistence façade composes them: every `atomic_write` happens inside
//! a lock section keyed to the same logical resource, which makes
//! check-then-write sequences race-free.
//!
//! Cross-process coordination is out of scope; multiple processes pointed at
//! the same storage root must be serialized externally.

pub mod atomic;
pub mod table;

pub use atomic::atomic_write;
pub use table::{LockHandle, LockTable};
