use std::{sync::Arc, time::Duration};

use crate::{
    error::AcquireError,
    fork::{Fork, ForkGuard},
};

/// 2本のフォークをどうやってデッドロックなしに取るか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Strategy {
    /// 全員で共有するゲートを握ったまま左 -> 右の順で取る
    /// 獲得の試行自体が直列化されるので循環待ちが起きない
    #[default]
    Gate,
    /// ゲートなし。番号の小さいフォークから取る (半順序による回避)
    Ordered,
}

// 両手に持ったフォーク
// 1本だけ持った状態を外に出さないため、2本そろってからしか作れない
pub struct Grip {
    first: ForkGuard,
    second: ForkGuard,
}

impl Grip {
    pub fn forks(&self) -> (usize, usize) {
        (self.first.index(), self.second.index())
    }
}

async fn grab(fork: &Arc<Fork>, limit: Option<Duration>) -> Result<ForkGuard, AcquireError> {
    match limit {
        Some(limit) => fork.acquire_within(limit).await,
        None => Ok(fork.acquire().await),
    }
}

impl Strategy {
    pub fn uses_gate(self) -> bool {
        matches!(self, Strategy::Gate)
    }

    // ゲートを握るのは呼び出し側の仕事。ここではフォークを取る順番だけ決める
    pub async fn take(
        self,
        left: &Arc<Fork>,
        right: &Arc<Fork>,
        limit: Option<Duration>,
    ) -> Result<Grip, AcquireError> {
        let (first, second) = match self {
            Strategy::Ordered if right.index() < left.index() => (right, left),
            _ => (left, right),
        };

        let first = grab(first, limit).await?;
        // 2本目で失敗したら first はここで drop され、置かれる
        let second = grab(second, limit).await?;

        Ok(Grip { first, second })
    }
}
