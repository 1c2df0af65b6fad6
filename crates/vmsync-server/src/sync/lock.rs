use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 按账号串行化同步：同一账号的两次同步不会并发写入状态与计数
#[derive(Clone, Default)]
pub struct AccountLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 等待并持有该账号的锁，guard 释放时解锁
    pub async fn acquire(&self, account_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                map.entry(account_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        if lock.try_lock().is_err() {
            tracing::debug!(account_id, "Waiting for in-flight sync of account");
        }
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn should_serialize_same_account() {
        let locks = AccountLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("acct-1").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_not_block_different_accounts() {
        let locks = AccountLocks::new();
        let _a = locks.acquire("acct-1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("acct-2")).await;
        assert!(b.is_ok());
    }
}
