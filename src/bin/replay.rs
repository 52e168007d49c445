// Order Book Replay - CLI
// Runs one replay episode over a recorded trading day

use chrono::{DateTime, Utc};
use clap::Parser;
use lob_replay::progress::{ReplayProgress, Spinner};
use lob_replay::{Config, HistoricalDatabase, ReplayError, ReplayResult, ReplaySimulator};
use std::path::PathBuf;
use tracing::{error, info, Level};

#[derive(Parser)]
#[command(name = "replay")]
#[command(version = "0.1.0")]
#[command(about = "Limit order book replay and matching simulator", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Write a default configuration file (if missing) and exit
    #[arg(long)]
    init: bool,

    /// Historical database (JSON snapshots and events)
    #[arg(long, required_unless_present = "init")]
    history: Option<PathBuf>,

    /// Episode start, RFC 3339 on a whole second
    #[arg(long, required_unless_present = "init")]
    start: Option<DateTime<Utc>>,

    /// Episode end, RFC 3339
    #[arg(long, required_unless_present = "init")]
    end: Option<DateTime<Utc>>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = if cli.init {
        Config::load_or_create(&cli.config).map_err(ReplayError::from)
    } else {
        Config::from_file(&cli.config).map_err(ReplayError::from)
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            error!("❌ Configuration Error");
            error!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if cli.init {
        info!("📁 Config ready at {}", cli.config.display());
        return;
    }

    info!("🚀 Order Book Replay v0.1.0");
    info!("📁 Config: {}", cli.config.display());

    if let Err(e) = run(&cli, &config) {
        error!("❌ Replay failed [{}]", e.category());
        error!("{}", e.user_message());
        std::process::exit(1);
    }
}

fn run(cli: &Cli, config: &Config) -> ReplayResult<()> {
    let (Some(history), Some(start), Some(end)) = (&cli.history, cli.start, cli.end) else {
        return Err(ReplayError::ConfigValidation(
            "--history, --start and --end are required".to_string(),
        ));
    };
    if end <= start {
        return Err(ReplayError::NonMonotonicStep { now: start, until: end });
    }

    let spinner = Spinner::new(&format!("Loading history from {}", history.display()));
    let database = match HistoricalDatabase::from_json_file(history) {
        Ok(db) => {
            spinner.finish(&format!(
                "Loaded {} snapshots and {} events",
                db.snapshot_count(),
                db.event_count()
            ));
            db
        }
        Err(e) => {
            spinner.finish_with_error("Could not load history");
            return Err(e);
        }
    };

    let sim_config = config.simulator.clone();
    let step = sim_config.step();
    let total_steps = ((end - start).num_seconds() as u64).div_ceil(sim_config.step_seconds);

    let mut simulator = ReplaySimulator::new(sim_config, &database, &database);
    simulator.reset_episode(start, None)?;

    let mut progress = if cli.quiet {
        ReplayProgress::hidden(total_steps)
    } else {
        ReplayProgress::new(total_steps)
    };

    let mut now = start;
    while now < end {
        let until = (now + step).min(end);
        let fills = match simulator.forward_step(until, Vec::new()) {
            Ok(fills) => fills,
            Err(e) => {
                progress.finish_with_error(&e.to_string());
                return Err(e);
            }
        };
        let book = simulator.order_book();
        progress.record_step(
            &fills,
            &book.best_buy_price().to_string(),
            &book.best_sell_price().to_string(),
        );
        now = until;
    }
    progress.finish();

    let stats = simulator.stats();
    let book = simulator.order_book();
    let (buy_depth, sell_depth) = book.depth();
    info!("📊 Replay summary for {}", config.simulator.ticker);
    info!("   Steps: {}", stats.steps);
    info!("   Feed events: {}", stats.external_events);
    info!("   Fills: {} internal / {} external", stats.internal_fills, stats.external_fills);
    info!("   Final book: {} buy / {} sell levels, best {} / {}", buy_depth, sell_depth, book.best_buy_price(), book.best_sell_price());
    if config.logging.log_resyncs {
        info!("   Resyncs: {} ({} levels overwritten)", stats.resyncs, stats.levels_overwritten);
    }

    Ok(())
}
