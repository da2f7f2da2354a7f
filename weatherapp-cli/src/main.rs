//! Binary crate for the `weatherapp` command-line client.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Driving the screen stack from the terminal
//! - Human-friendly output formatting

use clap::Parser;

mod app;
mod cli;
mod logging;
mod output;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
