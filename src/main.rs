// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            requirements,
            repo,
            index,
            defeat_cache,
            fail_fast,
            workers,
            platform,
            timeout,
        } => commands::cmd_convert(
            &requirements,
            &repo,
            &index,
            defeat_cache,
            fail_fast,
            workers,
            platform,
            timeout,
        ),
        Commands::List { repo } => commands::cmd_list(&repo),
        Commands::Verify { repo } => commands::cmd_verify(&repo),
    }
}
