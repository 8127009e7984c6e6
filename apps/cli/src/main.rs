//! docnorm CLI — document normalization preprocessor.
//!
//! Converts binary document formats found under a directory tree into
//! normalized text/structured representations plus durable index artifacts.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
