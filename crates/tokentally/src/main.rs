// SPDX-FileCopyrightText: 2026 Tokentally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! tokentally - usage-based cost accounting for LLM calls.
//!
//! This is the binary entry point: price one call, replay recorded runs, or
//! list the configured pricing tiers.

mod render;
mod replay;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokentally_config::TallyConfig;
use tokentally_core::{TallyError, UsageReport};
use tokentally_cost::{PricingTable, UsageAccumulator};

use crate::render::Style;

/// tokentally - usage-based cost accounting for LLM calls.
#[derive(Parser, Debug)]
#[command(name = "tokentally", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Disable colors.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Price a single call.
    Price {
        /// Model identifier, optionally provider-prefixed.
        #[arg(long)]
        model: String,
        /// Total input tokens, cached included.
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        input: i64,
        /// Input tokens served from cache. Omit if the provider did not report it.
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        cached: Option<i64>,
        /// Output tokens.
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        output: i64,
    },
    /// Replay recorded runs and print per-step and run totals.
    Replay {
        /// Recorded run files (JSON).
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List configured pricing tiers.
    Models,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => tokentally_config::load_and_validate_path(path),
        None => tokentally_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tokentally_config::render_errors(&errors);
            return ExitCode::from(2);
        }
    };

    init_tracing(&config.log.level, cli.plain);
    for warning in tokentally_config::config_warnings(&config) {
        warning.log();
    }

    let table = match PricingTable::from_config(&config) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("tokentally: {e}");
            return ExitCode::from(2);
        }
    };
    tracing::debug!(tiers = table.len(), "pricing table loaded");

    let style = Style {
        json: cli.json,
        color: !cli.plain && !cli.json && std::io::stdout().is_terminal(),
    };
    let accumulator = UsageAccumulator::new(table);

    match run_command(cli.command, &config, &accumulator, style) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tokentally: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_command(
    command: Commands,
    config: &TallyConfig,
    accumulator: &UsageAccumulator,
    style: Style,
) -> Result<(), TallyError> {
    let policy = config.cost.unreported_cache;
    match command {
        Commands::Price {
            model,
            input,
            cached,
            output,
        } => {
            let report = UsageReport {
                input_tokens: Some(input),
                output_tokens: Some(output),
                cached_input_tokens: cached,
                input_token_details: None,
            };
            let usage = report.resolve(policy)?;
            let resolved = accumulator.table().lookup(&model)?;
            let cost = resolved.tier.cost(&usage)?;
            render::print_price(resolved.model, &usage, &cost, style)
        }
        Commands::Replay { files } => {
            let mut runs = Vec::with_capacity(files.len());
            for path in &files {
                let recorded = replay::load_recorded_run(path)?;
                let replayed = replay::replay_run(accumulator, &recorded, policy)?;
                runs.push((path.clone(), replayed));
            }
            render::print_replay(&runs, style)
        }
        Commands::Models => render::print_models(accumulator.table(), style),
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `log.level`.
fn init_tracing(log_level: &str, plain: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tokentally={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal() && !plain)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_price_without_cached() {
        let cli = Cli::try_parse_from([
            "tokentally",
            "price",
            "--model",
            "gemini-3-flash-preview",
            "--input",
            "100",
            "--output",
            "5",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Price { cached: None, .. }));
    }

    #[test]
    fn cli_rejects_negative_counts() {
        let result = Cli::try_parse_from([
            "tokentally", "price", "--model", "m", "--input", "-1", "--output", "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_replay_requires_a_file() {
        assert!(Cli::try_parse_from(["tokentally", "replay"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tokentally", "models", "--json", "--plain"]).unwrap();
        assert!(cli.json && cli.plain);
    }
}
