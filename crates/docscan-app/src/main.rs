// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Docscan: document photos in, flattened PDF out.
//
// Entry point. Initialises logging, parses the command line, and runs one
// subcommand. Results go to stdout as a JSON line; logs go to stderr.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

use cli::{Cli, Command};
use docscan_core::error::ScanError;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "Docscan starting");

    match run(cli).await {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(name = err.name(), "{}", err);
            eprintln!("docscan: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, ScanError> {
    match cli.command {
        Command::Scan {
            images,
            output,
            quad,
            width,
        } => {
            let config = commands::load_config(cli.config.as_deref(), width)?;
            commands::scan(&config, &images, &output, quad).await
        }
        Command::Detect { image } => {
            let config = commands::load_config(cli.config.as_deref(), None)?;
            commands::detect(&config, &image)
        }
        Command::Inspect { pdf } => commands::inspect(&pdf),
    }
}
