use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dining::{
    config::{DEFAULT_PHILOSOPHERS, DEFAULT_UNITS},
    shutdown, DinnerConfig, Strategy, Table, Workload,
};

#[derive(Parser)]
#[command(name = "dining")]
#[command(about = "Dining philosophers on a ring of forks")]
struct Cli {
    /// Number of philosophers (and forks) at the table
    #[arg(short = 'n', long, env = "DINING_PHILOSOPHERS", default_value_t = DEFAULT_PHILOSOPHERS)]
    philosophers: usize,

    /// Time units to run before the stop signal fires
    #[arg(short, long, default_value_t = DEFAULT_UNITS)]
    units: u32,

    /// Length of one time unit in milliseconds
    #[arg(long, default_value_t = 1000)]
    unit_ms: u64,

    /// How forks are acquired: gate or ordered
    #[arg(long, value_enum, default_value = "gate")]
    strategy: Strategy,

    /// Give up on a fork after this many milliseconds
    #[arg(long)]
    acquire_timeout_ms: Option<u64>,

    /// Leave the table after this many meals
    #[arg(long)]
    meals: Option<u64>,

    /// Add up to one unit of random extra work to every delay
    #[arg(long)]
    jitter: bool,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> DinnerConfig {
        let unit = Duration::from_millis(self.unit_ms);
        let workload = if self.jitter {
            Workload::jittered(unit)
        } else {
            Workload::proportional(unit)
        };

        DinnerConfig {
            philosophers: self.philosophers,
            duration: unit.saturating_mul(self.units),
            workload,
            strategy: self.strategy,
            acquire_timeout: self.acquire_timeout_ms.map(Duration::from_millis),
            meals: self.meals,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let table = Table::new(cli.config()).context("invalid table configuration")?;
    let interrupt = shutdown::interrupt().context("failed to install signal handler")?;

    let report = table.run_until(interrupt).await?;

    for s in report.summaries() {
        info!("philosopher {} ate {} times (gave up {} times)", s.id, s.meals, s.gave_up);
    }
    if report.failed() > 0 {
        info!("{} philosophers failed", report.failed());
    }

    Ok(())
}
