//! Prospect CLI - offline-first lead tracking from the terminal
//!
//! Every write lands in the local database first; `prospect sync` exchanges
//! pending changes with the server.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{CategoryCommands, Cli, Commands, LeadCommands, LogCommands};
use crate::commands::common::resolve_db_path;
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
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("prospect=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let server = cli.server.as_deref();

    match cli.command {
        Commands::Register {
            email,
            password,
            name,
            role,
        } => {
            commands::auth::run_register(
                &email,
                &password,
                &name,
                role.map(Into::into),
                server,
                &db_path,
            )
            .await?;
        }
        Commands::Login { email, password } => {
            commands::auth::run_login(&email, &password, server, &db_path).await?;
        }
        Commands::Logout => commands::auth::run_logout(&db_path)?,
        Commands::Whoami => commands::auth::run_whoami(&db_path)?,
        Commands::Lead { command } => match command {
            LeadCommands::Add {
                name,
                location,
                phone,
                whatsapp,
                note,
            } => {
                commands::lead::run_add(
                    &name,
                    &location,
                    &phone,
                    whatsapp.as_deref(),
                    note.as_deref(),
                    &db_path,
                )?;
            }
            LeadCommands::List { json } => commands::lead::run_list(json, &db_path)?,
            LeadCommands::Close { id, category } => {
                commands::lead::run_close(&id, &category, &db_path)?;
            }
            LeadCommands::Delete { id } => commands::lead::run_delete(&id, &db_path)?,
        },
        Commands::Log { command } => match command {
            LogCommands::Add { lead, note, date } => {
                commands::call_log::run_add(&lead, &note, date, &db_path)?;
            }
            LogCommands::List { lead, json } => {
                commands::call_log::run_list(&lead, json, &db_path)?;
            }
        },
        Commands::Category { command } => match command {
            CategoryCommands::Add { name, kind } => {
                commands::category::run_add(&name, kind.into(), &db_path)?;
            }
            CategoryCommands::List { json } => commands::category::run_list(json, &db_path)?,
            CategoryCommands::Delete { id } => commands::category::run_delete(&id, &db_path)?,
        },
        Commands::Sync => commands::sync::run_sync(server, &db_path).await?,
    }

    Ok(())
}
