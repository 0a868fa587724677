use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::AcquireError,
    fork::Fork,
    strategy::{Grip, Strategy},
    workload::Workload,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Thinking,
    Attempting,
    Eating,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Thinking,
    Eating,
    FinishedEating,
    GaveUp(AcquireError),
    Stopped,
}

/// 状態遷移の通知。id は 1 始まり
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub id: usize,
    pub kind: EventKind,
}

/// 1人分の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub id: usize,
    pub meals: u64,
    pub gave_up: u64,
}

// 1回の実行の間、全員が共有するもの
#[derive(Clone)]
pub(crate) struct Shared {
    pub gate: Arc<Mutex<()>>,   // 食べるかどうかの判断とフォーク獲得を直列化する
    pub stop: CancellationToken, // 一度だけ発火する停止信号
    pub workload: Workload,
    pub strategy: Strategy,
    pub acquire_timeout: Option<Duration>,
    pub meals: Option<u64>,
    pub events: Option<UnboundedSender<Event>>,
}

enum Attempt {
    Ready(Grip),
    Skipped,
    GaveUp(AcquireError),
    Stopped,
}

pub struct Philosopher {
    id: usize,
    left: Arc<Fork>,
    right: Arc<Fork>,
    // 食べてよいか。この哲学者のタスクだけが読み書きする
    // 今は常に true で、ゲート内のチェックは間引きなどを入れるための口として残している
    eligible: bool,
    state: State,
    meals: u64,
    gave_up: u64,
    shared: Shared,
}

impl Philosopher {
    pub(crate) fn new(id: usize, left: Arc<Fork>, right: Arc<Fork>, shared: Shared) -> Self {
        Philosopher {
            id,
            left,
            right,
            eligible: true,
            state: State::Thinking,
            meals: 0,
            gave_up: 0,
            shared,
        }
    }

    fn seat(&self) -> usize {
        self.id - 1
    }

    fn full(&self) -> bool {
        self.shared.meals.is_some_and(|n| self.meals >= n)
    }

    fn transition(&mut self, next: State) {
        debug!(id = self.id, from = ?self.state, to = ?next, "transition");
        self.state = next;
    }

    fn emit(&self, kind: EventKind) {
        if let Some(tx) = &self.shared.events {
            // 受信側がいなくなっていても哲学者は止めない
            let _ = tx.send(Event { id: self.id, kind });
        }
    }

    pub async fn run(mut self) -> Summary {
        loop {
            // フォークを持っていないここでだけ停止を受け付ける
            if self.shared.stop.is_cancelled() || self.full() {
                break;
            }

            info!("philosopher {} is thinking", self.id);
            self.emit(EventKind::Thinking);
            self.transition(State::Attempting);

            match self.attempt().await {
                Attempt::Ready(grip) => self.eat(grip).await,
                Attempt::Skipped => {}
                Attempt::GaveUp(e) => {
                    self.gave_up += 1;
                    warn!("philosopher {} gave up: {}", self.id, e);
                    self.emit(EventKind::GaveUp(e));
                }
                Attempt::Stopped => break,
            }

            self.transition(State::Thinking);
        }

        self.transition(State::Stopped);
        self.emit(EventKind::Stopped);
        debug!(id = self.id, meals = self.meals, "left the table");

        Summary {
            id: self.id,
            meals: self.meals,
            gave_up: self.gave_up,
        }
    }

    async fn attempt(&mut self) -> Attempt {
        let stop = self.shared.stop.clone();
        let think = self.shared.workload.think(self.seat());

        // 考えている途中で停止信号が来たら、そのまま抜けてよい
        tokio::select! {
            biased;
            _ = stop.cancelled() => return Attempt::Stopped,
            _ = tokio::time::sleep(think) => {}
        }

        let gate = if self.shared.strategy.uses_gate() {
            let gate = self.shared.gate.clone();
            tokio::select! {
                biased;
                _ = stop.cancelled() => return Attempt::Stopped,
                g = gate.lock_owned() => Some(g),
            }
        } else {
            None
        };

        if !self.eligible {
            return Attempt::Skipped;
        }

        // ゲートを握ったまま両方のフォークを取る。ゲートは両方そろってから手放す
        let res = self
            .shared
            .strategy
            .take(&self.left, &self.right, self.shared.acquire_timeout)
            .await;
        drop(gate);

        match res {
            Ok(grip) => Attempt::Ready(grip),
            Err(e) => Attempt::GaveUp(e),
        }
    }

    async fn eat(&mut self, grip: Grip) {
        self.transition(State::Eating);
        info!("philosopher {} is eating", self.id);
        self.emit(EventKind::Eating);

        // 食事中は停止信号を見ない。食べ終わってフォークを置いてから止まる
        tokio::time::sleep(self.shared.workload.eat(self.seat())).await;
        drop(grip);

        self.meals += 1;
        self.eligible = true;
        info!("philosopher {} finished eating", self.id);
        self.emit(EventKind::FinishedEating);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::sync::mpsc;

    fn shared(strategy: Strategy, meals: Option<u64>) -> Shared {
        Shared {
            gate: Arc::new(Mutex::new(())),
            stop: CancellationToken::new(),
            workload: Workload::constant(Duration::from_millis(1)),
            strategy,
            acquire_timeout: None,
            meals,
            events: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_eats_until_full() {
        let (left, right) = (Arc::new(Fork::new(0)), Arc::new(Fork::new(1)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = shared(Strategy::Gate, Some(3));
        s.events = Some(tx);

        let summary = Philosopher::new(1, left.clone(), right.clone(), s).run().await;
        assert_eq!(summary, Summary { id: 1, meals: 3, gave_up: 0 });
        assert!(left.is_free() && right.is_free());

        let mut kinds = Vec::new();
        while let Ok(e) = rx.try_recv() {
            kinds.push(e.kind);
        }
        let cycle = [EventKind::Thinking, EventKind::Eating, EventKind::FinishedEating];
        let expected: Vec<_> = cycle
            .iter()
            .cycle()
            .take(9)
            .copied()
            .chain([EventKind::Stopped])
            .collect();
        assert_eq!(kinds, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_while_waiting_for_gate() {
        let (left, right) = (Arc::new(Fork::new(0)), Arc::new(Fork::new(1)));
        let s = shared(Strategy::Gate, None);
        let gate = s.gate.clone();
        let stop = s.stop.clone();

        // ゲートを誰かが握りっぱなしでも停止できる
        let _held = gate.lock().await;
        let t = tokio::spawn(Philosopher::new(1, left.clone(), right.clone(), s).run());
        tokio::time::sleep(Duration::from_millis(10)).await;

        stop.cancel();
        let summary = t.await.unwrap();
        assert_eq!(summary.meals, 0);
        assert!(left.is_free() && right.is_free());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finishes_meal_before_stopping() {
        let (left, right) = (Arc::new(Fork::new(0)), Arc::new(Fork::new(1)));
        let mut s = shared(Strategy::Ordered, None);
        s.workload = Workload::new(|_| Duration::from_millis(1), |_| Duration::from_secs(1));
        let stop = s.stop.clone();

        let t = tokio::spawn(Philosopher::new(1, left.clone(), right.clone(), s).run());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!left.is_free());

        stop.cancel();
        let summary = t.await.unwrap();
        assert_eq!(summary.meals, 1);
        assert!(left.is_free() && right.is_free());
    }
}
