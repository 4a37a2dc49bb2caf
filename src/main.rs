//! SLIPGRID — slip construction and staking engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! filters the prop board, builds POWER and FLEX slips concurrently,
//! sizes them and writes the staked slips to disk.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use slipgrid::config::AppConfig;
use slipgrid::engine::report::BatchReport;
use slipgrid::engine::runner::{run_parallel, BatchJob};
use slipgrid::storage;
use slipgrid::strategy::ev::{EvCalculator, PayoutTable};
use slipgrid::strategy::kelly::{BankrollOptimizer, PhaseDivisorTable};
use slipgrid::strategy::portfolio::PortfolioOptimizer;
use slipgrid::strategy::SlipStrategy;

const BANNER: &str = r#"
 ____  _     ___ ____   ____ ____  ___ ____
/ ___|| |   |_ _|  _ \ / ___|  _ \|_ _|  _ \
\___ \| |    | || |_) | |  _| |_) || || | | |
 ___) | |___ | ||  __/| |_| |  _ < | || |_| |
|____/|_____|___|_|    \____|_| \_\___|____/

  Slip construction and staking engine
"#;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let cfg = AppConfig::load_or_default(CONFIG_PATH)?;

    println!("{BANNER}");
    info!(
        bankroll = format!("${:.2}", cfg.bankroll.bankroll),
        power_target = cfg.optimizer.power_target,
        flex_target = cfg.optimizer.flex_target,
        beam_width = cfg.optimizer.beam_width,
        max_per_prop = cfg.optimizer.max_per_prop,
        "SLIPGRID starting up"
    );

    // -- Initialise components -------------------------------------------

    let payouts = PayoutTable::load(&cfg.paths.payout_tables)?;
    let divisors = PhaseDivisorTable::load(&cfg.paths.phase_divisors)?;

    let strategy = Arc::new(SlipStrategy::new(
        cfg.anomaly_filter(),
        PortfolioOptimizer::new(cfg.optimizer_config(), EvCalculator::new(payouts)),
        BankrollOptimizer::new(divisors, cfg.bet_constraints()),
    ));

    // -- Board -----------------------------------------------------------

    let props = storage::load_props(&cfg.paths.props)?;
    let (board, filter_stats) = strategy.prepare_board(&props);
    if board.is_empty() {
        warn!("No props left after filtering, nothing to build");
    }

    // -- Batches ---------------------------------------------------------

    let jobs = BatchJob::for_targets(cfg.targets(), cfg.bankroll.bankroll);
    let outcomes = run_parallel(Arc::clone(&strategy), Arc::new(board), jobs).await?;

    let report = BatchReport::build(&filter_stats, &outcomes, cfg.bankroll.bankroll);
    report.log();

    let written = storage::save_slips(
        outcomes.iter().flat_map(|o| o.staked.iter()),
        strategy.optimizer().calculator().payouts(),
        &cfg.paths.output,
    )?;
    info!(
        path = %cfg.paths.output.display(),
        slips = written,
        "Staked slips written"
    );

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("slipgrid=info"));

    if std::env::var("SLIPGRID_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
