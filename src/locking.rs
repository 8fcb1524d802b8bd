//! 按文件名串行化写入的内存锁。

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Manages asynchronous mutexes keyed by upload key.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指定 key 的写锁，并顺带清理已无人持有的条目。
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::KeyLocks;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyLocks::new());
        let guard = locks.lock_key("a.txt").await;

        let contender = locks.clone();
        let pending = tokio::spawn(async move { contender.lock_key("a.txt").await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        drop(guard);
        timeout(Duration::from_secs(1), pending)
            .await
            .expect("lock released")
            .expect("task");
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.lock_key("a").await;
        timeout(Duration::from_secs(1), locks.lock_key("b"))
            .await
            .expect("independent key");
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = KeyLocks::new();
        drop(locks.lock_key("a").await);
        drop(locks.lock_key("b").await);
        assert_eq!(locks.tracked().await, 1);
    }
}
