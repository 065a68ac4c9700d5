use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};

use elv_types::ResourceKey;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Exclusive ownership of one resource key.
///
/// Released exactly once, when the handle is dropped. Dropping happens on
/// every exit path of the owning scope, including unwinding, so a panicking
/// holder cannot wedge the key.
pub struct LockHandle {
    key: ResourceKey,
    _guard: OwnedMutexGuard<()>,
}

impl LockHandle {
    /// The key this handle owns.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockHandle({})", self.key)
    }
}

/// In-process table of named locks.
///
/// The table itself is the only shared mutable state and is guarded by its
/// own internal mutex, so concurrent `acquire` calls never corrupt it. The
/// per-key locks are tokio mutexes, which queue waiters in FIFO order:
/// operations on the same key run in strict arrival order, and operations on
/// different keys never block one another.
///
/// The table is an explicitly owned value, injected into the persistence
/// façade at construction. Tests instantiate their own.
pub struct LockTable {
    entries: StdMutex<HashMap<ResourceKey, Arc<AsyncMutex<()>>>>,
}

impl LockTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: StdMutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for `key`, suspending until it is free.
    ///
    /// No timeout is imposed here; a caller that wants a bounded wait wraps
    /// this in its own deadline and must not assume the lock was released on
    /// expiry (it releases independently when the holder finishes).
    pub async fn acquire(&self, key: &ResourceKey) -> LockHandle {
        let entry = self.entry(key);
        debug!(key = %key, "waiting for resource lock");
        let guard = entry.lock_owned().await;
        debug!(key = %key, "resource lock acquired");
        LockHandle {
            key: key.clone(),
            _guard: guard,
        }
    }

    /// Run `body` while holding the lock for `key`.
    ///
    /// The lock is released on every exit path of `body`, including panics.
    pub async fn with_lock<T, F, Fut>(&self, key: &ResourceKey, body: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _handle = self.acquire(key).await;
        body().await
    }

    /// Number of keys currently tracked (held, contended, or not yet pruned).
    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock table poisoned").len()
    }

    /// Returns `true` if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop table entries that are neither held nor waited on.
    pub fn prune(&self) {
        let mut entries = self.entries.lock().expect("lock table poisoned");
        // strong_count == 1 means the table holds the only reference: no
        // holder, no waiters.
        entries.retain(|_, entry| Arc::strong_count(entry) > 1);
    }

    fn entry(&self, key: &ResourceKey) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().expect("lock table poisoned");
        entries.retain(|_, entry| Arc::strong_count(entry) > 1);
        entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elv_types::{ElementId, ElementKind};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    fn key(id: &str) -> ResourceKey {
        ResourceKey::element(ElementKind::Persona, &ElementId::parse(id).unwrap())
    }

    #[tokio::test]
    async fn bodies_on_the_same_key_never_overlap() {
        let table = Arc::new(LockTable::new());
        let in_critical = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let table = table.clone();
            let in_critical = in_critical.clone();
            handles.push(tokio::spawn(async move {
                table
                    .with_lock(&key("alpha"), || async {
                        let was = in_critical.swap(true, Ordering::SeqCst);
                        assert!(!was, "two bodies overlapped on the same key");
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_critical.store(false, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let table = LockTable::new();
        let _alpha = table.acquire(&key("alpha")).await;

        let beta = timeout(Duration::from_millis(100), table.acquire(&key("beta"))).await;
        assert!(beta.is_ok(), "a different key must not block");
    }

    #[tokio::test]
    async fn waiters_run_in_arrival_order() {
        let table = Arc::new(LockTable::new());
        let order = Arc::new(StdMutex::new(Vec::new()));

        let gate = table.acquire(&key("alpha")).await;
        let mut handles = Vec::new();
        for i in 0..5 {
            let table = table.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _handle = table.acquire(&key("alpha")).await;
                order.lock().unwrap().push(i);
            }));
            // Let each task reach its lock call before spawning the next, so
            // arrival order is well defined.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        drop(gate);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn lock_is_released_when_the_body_panics() {
        let table = Arc::new(LockTable::new());

        let panicking = {
            let table = table.clone();
            tokio::spawn(async move {
                table
                    .with_lock(&key("alpha"), || async {
                        panic!("boom");
                    })
                    .await
            })
        };
        assert!(panicking.await.is_err());

        let reacquired = timeout(Duration::from_millis(100), table.acquire(&key("alpha"))).await;
        assert!(reacquired.is_ok(), "lock must be released after a panic");
    }

    #[tokio::test]
    async fn second_section_starts_after_first_fully_completes() {
        let table = Arc::new(LockTable::new());
        let completed_first = Arc::new(AtomicBool::new(false));

        let first = {
            let table = table.clone();
            let completed_first = completed_first.clone();
            tokio::spawn(async move {
                table
                    .with_lock(&key("alpha"), || async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        completed_first.store(true, Ordering::SeqCst);
                    })
                    .await;
            })
        };
        // Give the first task time to take the lock.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let observed = Arc::new(AtomicUsize::new(0));
        {
            let observed = observed.clone();
            let completed_first = completed_first.clone();
            table
                .with_lock(&key("alpha"), || async move {
                    if completed_first.load(Ordering::SeqCst) {
                        observed.store(1, Ordering::SeqCst);
                    }
                })
                .await;
        }
        first.await.unwrap();
        assert_eq!(
            observed.load(Ordering::SeqCst),
            1,
            "second body must observe the first one fully finished"
        );
    }

    #[tokio::test]
    async fn uncontended_entries_are_pruned() {
        let table = LockTable::new();
        {
            let _handle = table.acquire(&key("alpha")).await;
            assert_eq!(table.len(), 1);
        }
        table.prune();
        assert!(table.is_empty());
    }
}
