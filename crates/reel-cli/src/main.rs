//! Reel CLI - track movies and series from the command line
//!
//! Edits land in the local store first; `reel sync` and `reel watch` share
//! them with other devices through the configured relay.

mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::add::{run_add, AddOptions};
use crate::commands::common::load_context;
use crate::commands::config::run_config;
use crate::commands::discover::{run_popular, run_providers};
use crate::commands::export::run_export;
use crate::commands::import::run_import;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "reel=info"
                    .parse()
                    .map_err(|error| CliError::Config(format!("invalid log filter: {error}")))?,
            ),
        )
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    if let Commands::Config { command } = command {
        return run_config(command, cli.profile.as_deref());
    }

    let ctx = load_context(cli.db_path, cli.profile.as_deref())?;
    match command {
        Commands::Status { json } => run_status(&ctx, json).await?,
        Commands::Sync { command, relay } => run_sync(&ctx, command, relay).await?,
        Commands::Watch { relay, seconds } => run_watch(&ctx, relay, seconds).await?,
        Commands::Add {
            id,
            tv,
            title,
            watched,
            favourite,
            rating,
            tags,
        } => {
            let options = AddOptions {
                id,
                tv,
                title,
                watched,
                favourite,
                rating,
                tags,
            };
            run_add(&ctx, &options).await?;
        }
        Commands::Import { path } => run_import(&ctx, &path).await?,
        Commands::Export { format, output } => run_export(&ctx, format, output.as_deref()).await?,
        Commands::Popular { tv, region } => run_popular(&ctx, tv, region).await?,
        Commands::Providers { id, tv, region } => run_providers(&ctx, id, tv, region).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests;
