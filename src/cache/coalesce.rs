use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-key in-flight registry. Holding a key's guard marks a computation for
/// that key as running; other callers for the same key wait on `acquire`.
#[derive(Default)]
pub struct KeyedCoalescer {
    inflight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> InflightGuard<'_> {
        let registration = {
            let mut inflight = self.inflight.lock();
            let lock = Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            );
            Registration {
                registry: self,
                key: key.to_string(),
                lock,
            }
        };
        // A caller cancelled while waiting still drops `registration`.
        let guard = Arc::clone(&registration.lock).lock_owned().await;
        InflightGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of keys with a running or waiting computation.
    pub fn inflight_keys(&self) -> usize {
        self.inflight.lock().len()
    }
}

/// Holds the key's lock. Fields drop in order, so the lock is released
/// before the registration is forgotten.
pub struct InflightGuard<'a> {
    _guard: OwnedMutexGuard<()>,
    _registration: Registration<'a>,
}

/// One caller's interest in a key, running or waiting.
struct Registration<'a> {
    registry: &'a KeyedCoalescer,
    key: String,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut inflight = self.registry.inflight.lock();
        // Only the registry and this registration still reference the lock.
        if Arc::strong_count(&self.lock) == 2 {
            inflight.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_is_cleaned_up() {
        let coalescer = KeyedCoalescer::new();
        {
            let _guard = coalescer.acquire("a").await;
            assert_eq!(coalescer.inflight_keys(), 1);
        }
        assert_eq!(coalescer.inflight_keys(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let coalescer = KeyedCoalescer::new();
        let _a = coalescer.acquire("a").await;
        let _b = coalescer.acquire("b").await;
        assert_eq!(coalescer.inflight_keys(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_waits_for_release() {
        let coalescer = Arc::new(KeyedCoalescer::new());
        let first = coalescer.acquire("k").await;

        let waiter = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move {
                let _guard = coalescer.acquire("k").await;
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        assert_eq!(coalescer.inflight_keys(), 1);

        drop(first);
        waiter.await.unwrap();
        assert_eq!(coalescer.inflight_keys(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_is_cleaned_up() {
        let coalescer = Arc::new(KeyedCoalescer::new());
        let first = coalescer.acquire("k").await;

        let waiter = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move {
                let _guard = coalescer.acquire("k").await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        // Released while the waiter is parked, then the waiter goes away
        // before it can take the lock.
        drop(first);
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert_eq!(coalescer.inflight_keys(), 0);
    }
}
