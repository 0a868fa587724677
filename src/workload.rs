use std::{fmt, sync::Arc, time::Duration};

use rand::Rng;

/// 席番号 (0 始まり) から待ち時間を決める関数
pub type DelayFn = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

// 考える時間と食べる時間の代わりになる sleep の長さ
// テストではほぼ 0 にしたり、一時停止した時計で動かしたりする
#[derive(Clone)]
pub struct Workload {
    think: DelayFn,
    eat: DelayFn,
}

fn scaled(unit: Duration, seat: usize) -> Duration {
    let n = u32::try_from(seat + 1).unwrap_or(u32::MAX);
    unit.saturating_mul(n)
}

impl Workload {
    pub fn new<T, E>(think: T, eat: E) -> Self
    where
        T: Fn(usize) -> Duration + Send + Sync + 'static,
        E: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        Workload {
            think: Arc::new(think),
            eat: Arc::new(eat),
        }
    }

    /// 席 i の哲学者は (i + 1) 単位だけ考え、(i + 1) 単位だけ食べる
    pub fn proportional(unit: Duration) -> Self {
        Workload::new(move |seat| scaled(unit, seat), move |seat| scaled(unit, seat))
    }

    pub fn constant(delay: Duration) -> Self {
        Workload::new(move |_| delay, move |_| delay)
    }

    /// proportional に最大 1 単位のゆらぎを足す
    pub fn jittered(unit: Duration) -> Self {
        let jitter = move |seat| {
            let max = u64::try_from(unit.as_micros()).unwrap_or(u64::MAX);
            let extra = rand::thread_rng().gen_range(0..=max);
            scaled(unit, seat).saturating_add(Duration::from_micros(extra))
        };
        Workload::new(jitter, jitter)
    }

    pub fn think(&self, seat: usize) -> Duration {
        (self.think)(seat)
    }

    pub fn eat(&self, seat: usize) -> Duration {
        (self.eat)(seat)
    }
}

impl Default for Workload {
    fn default() -> Self {
        Workload::proportional(Duration::from_secs(1))
    }
}

impl fmt::Debug for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workload")
            .field("think(0)", &self.think(0))
            .field("eat(0)", &self.eat(0))
            .finish()
    }
}
