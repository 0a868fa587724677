use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::AcquireError;

// フォーク1本 = 排他ロック1つ
// 食事中 (ロック獲得中) に await するので tokio の Mutex を使う
pub struct Fork {
    index: usize,          // 輪の中での位置
    lock: Arc<Mutex<()>>,  // 状態は free / held だけなので中身は ()
    holders: AtomicUsize,  // 現在の保持者数
    peak: AtomicUsize,     // holders の最大値。1 を超えたら排他制御が壊れている
}

// フォークを持っている間だけ生きている型
// drop されるとフォークが置かれる
pub struct ForkGuard {
    fork: Arc<Fork>,
    _guard: OwnedMutexGuard<()>,
}

impl Fork {
    pub fn new(index: usize) -> Self {
        Fork {
            index,
            lock: Arc::new(Mutex::new(())),
            holders: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// 空くまで待ってからフォークを取る
    pub async fn acquire(self: &Arc<Self>) -> ForkGuard {
        let guard = self.lock.clone().lock_owned().await;

        let n = self.holders.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(n, Ordering::AcqRel);

        ForkGuard {
            fork: self.clone(),
            _guard: guard,
        }
    }

    /// limit 以内に取れなければ Timeout を返す。待っていた分の予約は残らない
    pub async fn acquire_within(self: &Arc<Self>, limit: Duration) -> Result<ForkGuard, AcquireError> {
        tokio::time::timeout(limit, self.acquire())
            .await
            .map_err(|_| AcquireError::Timeout {
                fork: self.index,
                limit,
            })
    }

    // try_lock で取れた場合もその場で drop されるので状態は変わらない
    pub fn is_free(&self) -> bool {
        self.lock.try_lock().is_ok()
    }

    pub fn peak_holders(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

impl ForkGuard {
    pub fn index(&self) -> usize {
        self.fork.index
    }
}

impl Drop for ForkGuard {
    fn drop(&mut self) {
        // フィールドの _guard はこの後に drop されるので、カウンタを戻してからロックが外れる
        self.fork.holders.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_acquire_release() {
        let fork = Arc::new(Fork::new(3));
        assert!(fork.is_free());

        let guard = fork.acquire().await;
        assert_eq!(guard.index(), 3);
        assert!(!fork.is_free());

        drop(guard);
        assert!(fork.is_free());
        assert_eq!(fork.peak_holders(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_within_timeout() {
        let fork = Arc::new(Fork::new(0));
        let _held = fork.acquire().await;

        let limit = Duration::from_millis(10);
        let err = fork.acquire_within(limit).await.err();
        assert_eq!(err, Some(AcquireError::Timeout { fork: 0, limit }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_gets_fork_after_release() {
        let fork = Arc::new(Fork::new(1));
        let held = fork.acquire().await;

        let fork0 = fork.clone();
        let waiter = tokio::spawn(async move {
            let _g = fork0.acquire().await;
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
        assert!(fork.is_free());
        assert_eq!(fork.peak_holders(), 1);
    }
}
