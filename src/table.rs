use std::{future::Future, sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::{
    sync::{mpsc, Mutex},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::DinnerConfig,
    error::DinnerError,
    fork::Fork,
    philosopher::{Event, Philosopher, Shared, Summary},
};

/// 1回の食事の結果
#[derive(Debug, Clone)]
pub struct Report {
    summaries: Vec<Summary>,
    failed: usize,
    elapsed: Duration,  // 開始から停止信号まで
    shutdown: Duration, // 停止信号から全員の終了まで
}

impl Report {
    pub fn summaries(&self) -> &[Summary] {
        &self.summaries
    }

    pub fn summary(&self, id: usize) -> Option<&Summary> {
        self.summaries.iter().find(|s| s.id == id)
    }

    pub fn total_meals(&self) -> u64 {
        self.summaries.iter().map(|s| s.meals).sum()
    }

    pub fn total_gave_up(&self) -> u64 {
        self.summaries.iter().map(|s| s.gave_up).sum()
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn shutdown(&self) -> Duration {
        self.shutdown
    }
}

// フォークを輪に並べたテーブル
// 席 i の哲学者は左にフォーク i、右にフォーク (i + 1) % N を持つ
pub struct Table {
    config: DinnerConfig,
    forks: Vec<Arc<Fork>>,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl Table {
    pub fn new(config: DinnerConfig) -> Result<Self, DinnerError> {
        config.validate()?;
        let forks = (0..config.philosophers).map(|i| Arc::new(Fork::new(i))).collect();
        Ok(Table {
            config,
            forks,
            events: None,
        })
    }

    /// 状態遷移を受け取るチャネル。run より前に呼ぶ
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn forks(&self) -> &[Arc<Fork>] {
        &self.forks
    }

    /// 席 seat の (左, 右) のフォーク番号
    pub fn neighbors(&self, seat: usize) -> (usize, usize) {
        let n = self.forks.len();
        (seat % n, (seat + 1) % n)
    }

    pub async fn run(&self) -> Result<Report, DinnerError> {
        self.run_until(std::future::pending()).await
    }

    /// interrupt が先に完了したら、時間切れを待たずに停止信号を出す
    pub async fn run_until<F>(&self, interrupt: F) -> Result<Report, DinnerError>
    where
        F: Future<Output = ()>,
    {
        let n = self.forks.len();
        // 停止信号とゲートは実行ごとに作る。停止信号は一度発火したら戻らない
        let shared = Shared {
            gate: Arc::new(Mutex::new(())),
            stop: CancellationToken::new(),
            workload: self.config.workload.clone(),
            strategy: self.config.strategy,
            acquire_timeout: self.config.acquire_timeout,
            meals: self.config.meals,
            events: self.events.clone(),
        };

        let handles: Vec<_> = (0..n)
            .map(|seat| {
                let (l, r) = self.neighbors(seat);
                let p = Philosopher::new(
                    seat + 1,
                    self.forks[l].clone(),
                    self.forks[r].clone(),
                    shared.clone(),
                );
                tokio::spawn(p.run())
            })
            .collect();

        info!(
            philosophers = n,
            strategy = ?self.config.strategy,
            "dinner started, stopping in {:?}",
            self.config.duration
        );
        let started = Instant::now();

        let joined = join_all(handles);
        tokio::pin!(joined);

        // 全員が満腹になれば時間切れ前に終わる
        let early = tokio::select! {
            results = &mut joined => {
                info!("every philosopher left the table before the deadline");
                Some(results)
            }
            _ = tokio::time::sleep(self.config.duration) => None,
            _ = interrupt => {
                info!("interrupted");
                None
            }
        };

        let stopped_at = Instant::now();
        shared.stop.cancel();
        info!("stop signal sent");

        let results = match early {
            Some(results) => results,
            None => joined.await,
        };
        let shutdown = stopped_at.elapsed();

        let mut summaries = Vec::with_capacity(n);
        let mut failed = 0;
        for (seat, res) in results.into_iter().enumerate() {
            match res {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    // 落ちたタスクが持っていたフォークは unwind の drop で置かれている
                    error!("philosopher {} failed: {}", seat + 1, e);
                    failed += 1;
                }
            }
        }

        if summaries.is_empty() {
            return Err(DinnerError::AllFailed(n));
        }

        info!(
            meals = summaries.iter().map(|s| s.meals).sum::<u64>(),
            "everyone left the table after {:?}",
            shutdown
        );

        Ok(Report {
            summaries,
            failed,
            elapsed: stopped_at - started,
            shutdown,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ring_wiring() {
        let table = Table::new(DinnerConfig::default()).unwrap();
        assert_eq!(table.forks().len(), 5);
        assert_eq!(table.neighbors(0), (0, 1));
        assert_eq!(table.neighbors(4), (4, 0));

        // 隣同士はちょうど1本を共有する
        for seat in 0..5 {
            let (_, right) = table.neighbors(seat);
            let (next_left, _) = table.neighbors((seat + 1) % 5);
            assert_eq!(right, next_left);
        }
    }

    #[test]
    fn test_invalid_config() {
        let config = DinnerConfig {
            philosophers: 0,
            ..Default::default()
        };
        assert!(matches!(Table::new(config), Err(DinnerError::TooFewPhilosophers(0))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_ends_run() {
        let table = Table::new(DinnerConfig::default()).unwrap();
        let interrupt = tokio::time::sleep(Duration::from_secs(3));

        let report = table.run_until(interrupt).await.unwrap();
        assert_eq!(report.elapsed(), Duration::from_secs(3));
        assert!(table.forks().iter().all(|f| f.is_free()));
    }
}
