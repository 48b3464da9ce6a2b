//! Keyed mutex
//!
//! Serializes operations that AWS does not allow to run concurrently
//! against the same parent object, such as two feature updates on one
//! GuardDuty detector. Different keys never block each other.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct MutexKV {
    store: DashMap<String, Arc<Mutex<()>>>,
}

impl MutexKV {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting for any current holder.
    /// The lock is released when the returned guard is dropped.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        log::debug!("locking {:?}", key);
        let guard = self.get(key).lock_owned().await;
        log::debug!("locked {:?}", key);
        guard
    }

    fn get(&self, key: &str) -> Arc<Mutex<()>> {
        // The shard lock is released before awaiting the mutex
        self.store
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

static GLOBAL_MUTEX_KV: OnceLock<MutexKV> = OnceLock::new();

/// Process-wide instance shared by all resources
pub fn global_mutex_kv() -> &'static MutexKV {
    GLOBAL_MUTEX_KV.get_or_init(MutexKV::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn same_key_is_serialized() {
        let kv = Arc::new(MutexKV::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let kv = kv.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            handles.push(tokio::spawn(async move {
                let _guard = kv.lock("detector-1").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let kv = MutexKV::new();
        let _a = kv.lock("detector-1").await;
        let b = tokio::time::timeout(Duration::from_secs(1), kv.lock("detector-2")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn lock_is_released_on_drop() {
        let kv = MutexKV::new();
        drop(kv.lock("k").await);
        let again = tokio::time::timeout(Duration::from_secs(1), kv.lock("k")).await;
        assert!(again.is_ok());
    }

    #[test]
    fn global_instance_is_shared() {
        assert!(std::ptr::eq(global_mutex_kv(), global_mutex_kv()));
    }
}
