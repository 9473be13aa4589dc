// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Search { query, aur } => commands::cmd_search(config, &query, aur),
        Commands::Info { name } => commands::cmd_info(config, &name),
        Commands::Resolve { name } => commands::cmd_resolve(config, &name),
        Commands::Install { name, yes } => commands::cmd_install(config, &name, yes),
        Commands::Upgrade { no_vcs, yes } => commands::cmd_upgrade(config, no_vcs, yes),
        Commands::Clean { target, yes } => commands::cmd_clean(config, target, yes),
    }
}
