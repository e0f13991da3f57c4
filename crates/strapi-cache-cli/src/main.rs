//! strapi-cache CLI - cached reads from a Strapi CMS
//!
//! This is the main entry point for the `strapi-cache` command-line interface.
//! Command implementations live in `commands`, one module per command.

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod utils;

use cli::{Cli, Commands};
use commands::{ReadTarget, Session};
use utils::initialize_logging;
use utils::settings::{cache_dir, resolve_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    execute_command(cli).await
}

async fn execute_command(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    if let Commands::Config { path } = &cli.command {
        return commands::show_config(&config, *path);
    }

    let session = Session::open(config, cache_dir(&cli)?)?;
    let result = run_in_session(&session, cli.command).await;
    session.finish().await;
    result
}

async fn run_in_session(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Collection { name, query } => {
            commands::read(session, &ReadTarget::Collection(name), &query).await
        },
        Commands::Count { name, query } => {
            commands::read(session, &ReadTarget::Count(name), &query).await
        },
        Commands::Entry { name, id, query } => {
            commands::read(session, &ReadTarget::Entry(name, id), &query).await
        },
        Commands::Single { name, query } => {
            commands::read(session, &ReadTarget::Single(name), &query).await
        },
        Commands::Create { name, data } => commands::create(session, &name, &data).await,
        Commands::Update { name, id, data } => commands::update(session, &name, &id, &data).await,
        Commands::Forget {
            endpoint,
            collection,
            query,
        } => commands::forget(session, &endpoint, collection, &query).await,
        Commands::Config { .. } => Ok(()),
    }
}
