//! # Itinerary Harness CLI (`itin`)
//!
//! The `itin` binary reconstructs a continuous travel history from a
//! partially complete itinerary: it detects geographic gaps between
//! consecutive legs, mines an exported email corpus for evidence of the
//! missing legs, extracts structured travel records with an AI provider,
//! and merges the matches back into the itinerary.
//!
//! ## Usage
//!
//! ```bash
//! itin --config ./config/itin.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `itin gaps` | Identify gaps in the configured itinerary |
//! | `itin fill` | Full processing: detect, mine, extract, match, merge, save |
//! | `itin check <file>` | Check whether the gaps are connected in an existing CSV |
//! | `itin annotate <file>` | Add connection-analysis columns to an existing CSV |

mod annotate;
mod batcher;
mod config;
mod connector_mail;
mod country;
mod extraction;
mod filter;
mod gaps;
mod matcher;
mod merge;
mod models;
mod pipeline;
mod store;
mod vocab;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Itinerary Harness CLI — fill travel itinerary gaps from email evidence.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/itin.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "itin",
    about = "Itinerary Harness — reconstruct a continuous travel history from email evidence",
    version,
    long_about = "Itinerary Harness detects geographic discontinuities between consecutive travel \
    legs, filters a large email export down to plausible evidence with keyword and date-window \
    passes, extracts structured travel records in rate-limited AI batches, and merges matching \
    records back into the itinerary under chronological-ordering invariants."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/itin.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Identify gaps in the configured itinerary.
    ///
    /// Loads and sorts the itinerary, lists every gap with its
    /// COUNTRY/CITY classification, and reports incongruent-event
    /// warnings. No emails are read and nothing is written.
    Gaps,

    /// Run the full gap-filling pipeline.
    ///
    /// Detects gaps, scans the email export, applies the keyword and
    /// date-window filters, extracts candidate records in batches via the
    /// configured AI provider, matches them against the gaps, merges the
    /// validated fills, and saves a timestamped output CSV.
    Fill,

    /// Check whether the configured itinerary's gaps are connected in an
    /// arbitrary existing CSV file.
    Check {
        /// Itinerary CSV to inspect.
        file: PathBuf,
    },

    /// Add connection-analysis columns to an existing itinerary CSV.
    ///
    /// Writes `<stem>_with_connections.csv` with `next_country_match` and
    /// `next_city_match` columns labelling whether each row's arrival
    /// already connects to the following row's departure.
    Annotate {
        /// Itinerary CSV to annotate.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Annotate works on a standalone file and needs no config.
    if let Commands::Annotate { file } = &cli.command {
        annotate::run_annotate(file)?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Gaps => {
            pipeline::run_gaps(&cfg)?;
        }
        Commands::Fill => {
            pipeline::run_fill(&cfg).await?;
        }
        Commands::Check { file } => {
            pipeline::run_check(&cfg, &file)?;
        }
        Commands::Annotate { .. } => unreachable!(),
    }

    Ok(())
}
