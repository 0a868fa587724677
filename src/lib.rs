//! 食事する哲学者の問題
//!
//! N 本のフォークを輪に並べ、N 人の哲学者を tokio のタスクとして走らせる。
//! 一定時間後に停止信号を一度だけ出し、全員がフォークを置いて席を立つまで待つ。

pub mod config;
pub mod error;
pub mod fork;
pub mod philosopher;
pub mod shutdown;
pub mod strategy;
pub mod table;
pub mod workload;

pub use config::DinnerConfig;
pub use error::{AcquireError, DinnerError};
pub use philosopher::{Event, EventKind, State, Summary};
pub use strategy::Strategy;
pub use table::{Report, Table};
pub use workload::Workload;
