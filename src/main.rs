//! Main entry point for mash_species_id.
//!
//! Identifies the species of a sequenced isolate by comparing its reads (or
//! assembly) against a mash sketch of reference genomes:
//! 1. Concatenate the read pair into a scratch file.
//! 2. Run an unfiltered `mash dist` to estimate genome size and coverage.
//! 3. Derive the minimum k-mer copy number and rerun with `-m`.
//! 4. Parse the distance table and resolve the best match.
//! 5. Append a plain-text report.

mod bio;
mod cli;
mod config;
mod io;
mod organisms;
mod pipeline;
mod utils;
use cli::{run_cli, Cli};

use anyhow::Result;
use clap::Parser;
use log::info;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Starting mash_species_id {}", env!("CARGO_PKG_VERSION"));

    run_cli(cli)?;

    info!("Finished");
    Ok(())
}
