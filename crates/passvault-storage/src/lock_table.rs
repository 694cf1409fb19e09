//! Reference-counted per-id locks.
//!
//! One coarse mutex guards the table; each entry holds the fine lock for a single id plus
//! the number of callers currently waiting on or holding it. The coarse mutex is never held
//! while blocking on a fine lock, so distinct ids never wait on each other. An entry is
//! removed as soon as its last holder releases it, leaving no residue for idle ids.

use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::{lock_api::ArcMutexGuard, Mutex, RawMutex};
use passvault_core::normalize_id;

struct Entry {
    lock: Arc<Mutex<()>>,
    holders: usize,
}

#[derive(Default)]
pub struct LockTable {
    entries: Mutex<HashMap<String, Entry>>,
}

/// Holds the fine lock of one id until dropped.
#[must_use = "the id is unlocked as soon as the guard is dropped"]
pub struct IdGuard<'a> {
    table: &'a LockTable,
    id: String,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the caller owns `id`.
    pub fn lock(&self, id: &str) -> IdGuard<'_> {
        let id = normalize_id(id);

        let lock = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(id.clone()).or_insert_with(|| Entry {
                lock: Arc::new(Mutex::new(())),
                holders: 0,
            });
            entry.holders += 1;
            Arc::clone(&entry.lock)
        };

        let guard = lock.lock_arc();
        IdGuard {
            table: self,
            id,
            guard: Some(guard),
        }
    }

    /// Number of ids with at least one waiting or holding caller.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, id: &str, guard: Option<ArcMutexGuard<RawMutex, ()>>) {
        let mut entries = self.entries.lock();
        drop(guard);

        let last = match entries.get_mut(id) {
            Some(entry) => {
                entry.holders = entry.holders.saturating_sub(1);
                entry.holders == 0
            }
            // Untracked id, nothing to clean up.
            None => false,
        };
        if last {
            entries.remove(id);
        }
    }
}

impl fmt::Debug for LockTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockTable")
            .field("tracked", &self.len())
            .finish()
    }
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        let guard = self.guard.take();
        self.table.release(&self.id, guard);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    use super::*;

    #[test]
    fn entry_is_removed_after_last_release() {
        let table = LockTable::new();
        {
            let _a = table.lock("Foo");
            assert_eq!(table.len(), 1);
        }
        assert!(table.is_empty());
    }

    #[test]
    fn ids_are_normalized() {
        let table = LockTable::new();
        let guard = table.lock("A\\B");
        assert_eq!(table.len(), 1);
        drop(guard);
        let _upper = table.lock("a/b");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn same_id_is_mutually_exclusive() {
        let table = LockTable::new();
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        let _guard = table.lock("shared");
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn distinct_ids_do_not_block() {
        let table = LockTable::new();
        let _held = table.lock("first");

        thread::scope(|scope| {
            let handle = scope.spawn(|| {
                let _other = table.lock("second");
                true
            });
            thread::sleep(Duration::from_millis(10));
            assert!(handle.join().expect("join"));
        });

        assert_eq!(table.len(), 1);
    }
}
