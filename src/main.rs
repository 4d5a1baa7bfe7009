//! eic-engine CLI
//!
//! Computes expected values, testing guidance and verdicts for a schedule of
//! test results. Output is JSON on stdout; logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use eic_engine::calculator::{default_calculator, load_tables, Calculator};
use eic_engine::evaluation::TestResult;
use eic_engine::schedule::{build_schedule_with, evaluate_schedule, Schedule};

/// BS 7671 initial verification: expected values and test guidance
#[derive(Parser, Debug)]
#[command(name = "eic-engine", author, version, about, long_about = None)]
struct Cli {
    /// Reference tables to use instead of the embedded BS 7671 tables
    #[arg(long, global = true, env = "EIC_TABLES")]
    tables: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit compact rather than pretty-printed JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Expected values for every circuit in a schedule
    Expected {
        /// Schedule JSON file
        schedule: PathBuf,
    },

    /// Ordered testing guidance for every circuit in a schedule
    Guidance {
        /// Schedule JSON file
        schedule: PathBuf,
    },

    /// Evaluate recorded results against a schedule
    Evaluate {
        /// Schedule JSON file
        schedule: PathBuf,
        /// Recorded results JSON file (array of results keyed by circuit number)
        results: PathBuf,
    },

    /// Summarise the reference tables in use
    Tables,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let custom;
    let calculator: &Calculator = match &cli.tables {
        Some(path) => {
            custom = Calculator::new(load_tables(path)?);
            info!("Using reference tables from {}", path.display());
            &custom
        }
        None => default_calculator(),
    };

    match &cli.command {
        Commands::Expected { schedule } => {
            let schedule = read_schedule(schedule)?;
            let report = build_schedule_with(calculator, &schedule.circuits)?;
            let expected: Vec<_> = report.circuits.iter().map(|c| &c.expected).collect();
            print_json(&expected, cli.compact)
        }
        Commands::Guidance { schedule } => {
            let schedule = read_schedule(schedule)?;
            let report = build_schedule_with(calculator, &schedule.circuits)?;
            if report.estimated_count() > 0 {
                info!(
                    "{} circuit(s) use estimated values; record circuit lengths for exact figures",
                    report.estimated_count()
                );
            }
            print_json(&report, cli.compact)
        }
        Commands::Evaluate { schedule, results } => {
            let schedule = read_schedule(schedule)?;
            let results: Vec<TestResult> = read_json(results)?;
            let evaluations = evaluate_schedule(calculator, &schedule.circuits, &results)?;
            let passed = evaluations.iter().filter(|e| e.passed()).count();
            info!("{} of {} circuits passed every test", passed, evaluations.len());
            print_json(&evaluations, cli.compact)
        }
        Commands::Tables => print_json(&calculator.tables().summary(), cli.compact),
    }
}

fn read_schedule(path: &Path) -> Result<Schedule> {
    let schedule: Schedule = read_json(path)?;
    info!(
        "Loaded {} circuits{}",
        schedule.circuits.len(),
        schedule
            .board
            .as_deref()
            .map(|b| format!(" for board {}", b))
            .unwrap_or_default()
    );
    Ok(schedule)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", json);
    Ok(())
}
