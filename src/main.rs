//! # lctrace
//!
//! Command-line front end for liquid-chromatography trace processing.
//!
//! ## Usage
//!
//! ```bash
//! # Decode every export in a folder, write CSVs to ./<id>
//! lctrace process traces/ --hplc-flow-rate 0.5
//!
//! # ...and save a reduced copy to the document store
//! lctrace process traces/*.arw -d --store ~/experiments
//!
//! # Register a flow rate for instrument methods containing "Sup6Inc"
//! lctrace settings set-flow Sup6Inc 0.5
//!
//! # Re-save old documents at the current layout
//! lctrace store --path ~/experiments migrate
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
