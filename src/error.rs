use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DinnerError {
    // 1人だと左右のフォークが同じものになり、自分自身を待ってしまう
    #[error("a table needs at least 2 philosophers, got {0}")]
    TooFewPhilosophers(usize),
    #[error("acquire timeout must be longer than zero")]
    ZeroAcquireTimeout,
    #[error("all {0} philosophers failed")]
    AllFailed(usize),
}

/// フォーク獲得の失敗。獲得しようとした哲学者の中だけで処理される
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    #[error("fork {fork} could not be acquired within {limit:?}")]
    Timeout { fork: usize, limit: Duration },
}
