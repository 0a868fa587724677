use std::time::Duration;

use crate::{error::DinnerError, strategy::Strategy, workload::Workload};

pub const DEFAULT_PHILOSOPHERS: usize = 5; // 哲学者の数
pub const DEFAULT_UNIT: Duration = Duration::from_secs(1); // 1単位時間
pub const DEFAULT_UNITS: u32 = 10; // 停止までの単位時間数

#[derive(Debug, Clone)]
pub struct DinnerConfig {
    /// 輪に座る人数 (= フォークの本数)
    pub philosophers: usize,
    /// 停止信号を出すまでの時間
    pub duration: Duration,
    pub workload: Workload,
    pub strategy: Strategy,
    /// None なら空くまで待ち続ける
    pub acquire_timeout: Option<Duration>,
    /// 各哲学者がこの回数食べたら席を立つ
    pub meals: Option<u64>,
}

impl Default for DinnerConfig {
    fn default() -> Self {
        DinnerConfig {
            philosophers: DEFAULT_PHILOSOPHERS,
            duration: DEFAULT_UNIT * DEFAULT_UNITS,
            workload: Workload::proportional(DEFAULT_UNIT),
            strategy: Strategy::default(),
            acquire_timeout: None,
            meals: None,
        }
    }
}

impl DinnerConfig {
    pub fn validate(&self) -> Result<(), DinnerError> {
        if self.philosophers < 2 {
            return Err(DinnerError::TooFewPhilosophers(self.philosophers));
        }
        if self.acquire_timeout == Some(Duration::ZERO) {
            return Err(DinnerError::ZeroAcquireTimeout);
        }
        Ok(())
    }
}
