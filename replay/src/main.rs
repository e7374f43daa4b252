#![warn(clippy::all, rust_2018_idioms)]

use replay::config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Log to stdout (if you run with `RUST_LOG=debug`).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // load configuration file
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let summary = replay::replay(&config)?;

    info!(
        "Done after {} cycles, {} occupied cells, cycle time {}",
        summary.cycles, summary.occupied_cells, summary.cycle_stats
    );
    Ok(())
}
