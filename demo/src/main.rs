//! fides Trust Core — Demo CLI
//!
//! Runs one or all of the three trust-core demo scenarios.  Each scenario
//! uses real fides components (audit ledger, workflow runner, prediction
//! cache, orchestrator) wired together with mock handlers and data.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- forecast-run
//!   cargo run -p demo -- tamper-evidence
//!   cargo run -p demo -- cache-freshness

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod mock_engine;
mod scenarios;

use scenarios::{cache_freshness, forecast_run, tamper_evidence};

// ── CLI definition ────────────────────────────────────────────────────────────

/// fides — auditable workflow and prediction trust core demo.
///
/// Each subcommand runs one or all of the three scenarios, demonstrating
/// hash-chained audit trails, bounded workflow runs, and TTL-fresh
/// prediction caching.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "fides trust core demo",
    long_about = "Runs fides trust core demo scenarios showing workflow run\n\
                  lifecycles, audit chain tamper evidence, and read-through\n\
                  prediction caching with TTL freshness."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three scenarios in sequence.
    RunAll,
    /// Scenario 1: Forecast Workflow Lifecycle (runs, failures, audit trail).
    ForecastRun,
    /// Scenario 2: Tamper Evidence (hash chain catches an in-place edit).
    TamperEvidence,
    /// Scenario 3: Prediction Cache Freshness (read-through with TTL).
    CacheFreshness,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::ForecastRun => forecast_run::run_scenario(),
        Command::TamperEvidence => tamper_evidence::run_scenario(),
        Command::CacheFreshness => cache_freshness::run_scenario(),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all() -> fides_contracts::error::FidesResult<()> {
    forecast_run::run_scenario()?;
    tamper_evidence::run_scenario()?;
    cache_freshness::run_scenario()?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("fides — Auditable Workflow and Prediction Trust Core");
    println!("====================================================");
    println!();
    println!("Trust guarantees demonstrated:");
    println!("  [1] Every consequential action lands on a SHA-256 hash chain");
    println!("  [2] Workflow runs reach exactly one terminal state, start-audited first");
    println!("  [3] Run and step duration bounds enforced at step boundaries");
    println!("  [4] Predictions served read-through with TTL freshness, populations audited");
    println!("  [5] Any in-place edit of a stored record breaks chain verification");
    println!();
}
