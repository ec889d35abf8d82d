//! CLI for the bulkapply engine.

mod commands;

use anyhow::Result;
use bulkapply_core::config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_config, run_simulate, SimulateOptions};

/// Top-level CLI for the bulkapply engine.
#[derive(Debug, Parser)]
#[command(name = "bulkapply")]
#[command(about = "bulkapply: retrying bulk row mutations against a faulty store", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the XDG config dir.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Apply a synthetic batch to an in-memory store with injected faults.
    Simulate {
        /// Number of rows in the batch.
        #[arg(long, default_value = "100", value_name = "N")]
        rows: usize,
        /// Probability that a row is reported UNAVAILABLE.
        #[arg(long, default_value = "0.1", value_name = "P")]
        fail_rate: f64,
        /// Probability that a row is reported OUT_OF_RANGE.
        #[arg(long, default_value = "0.0", value_name = "P")]
        permanent_rate: f64,
        /// Probability that the stream ends right after applying a row.
        #[arg(long, default_value = "0.0", value_name = "P")]
        truncate_rate: f64,
        /// Probability that an attempt is aborted part way through.
        #[arg(long, default_value = "0.0", value_name = "P")]
        abort_rate: f64,
        /// Seed for reproducible faults.
        #[arg(long)]
        seed: Option<u64>,
        /// Make every K-th row use a server-assigned timestamp.
        #[arg(long, value_name = "K")]
        server_time_every: Option<usize>,
        /// Table name (defaults to `table` from the config).
        #[arg(long)]
        table: Option<String>,
    },

    /// Print the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Simulate {
                rows,
                fail_rate,
                permanent_rate,
                truncate_rate,
                abort_rate,
                seed,
                server_time_every,
                table,
            } => {
                let opts = SimulateOptions {
                    rows,
                    fail_rate,
                    permanent_rate,
                    truncate_rate,
                    abort_rate,
                    seed,
                    server_time_every,
                    table,
                };
                run_simulate(&cfg, opts).await?;
            }
            CliCommand::Config => run_config(&cfg, cli.config.as_deref())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
