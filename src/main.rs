use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Output};
use colored::Colorize;
use log::{error, info, warn};
use radiotation_collab::{
    Catalog, Collab, CollabError, DatabaseError, LogHub, SongError, SqliteDatabase,
};
use radiotation_core::Config;
use thiserror::Error;
use tokio::runtime;

mod cli;
mod logging;

#[derive(Debug, Error)]
enum AppError {
    #[error("Could not open database: {0}")]
    Database(DatabaseError),

    #[error("Could not load catalog: {0}")]
    Catalog(SongError),

    #[error(transparent)]
    Collab(#[from] CollabError),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl AppError {
    fn hint(&self) -> &'static str {
        match self {
            AppError::Database(_) => {
                "Make sure the path given with --database or RADIOTATION_DATABASE is writable."
            }
            AppError::Catalog(_) => {
                "The catalog has to be a JSON array of tracks, each with an \"id\" and a \"name\"."
            }
            AppError::Collab(error) => match error {
                CollabError::Database(DatabaseError::NotFound { .. }) => {
                    "Check the ids you passed. Room codes are four capital letters."
                }
                CollabError::Database(DatabaseError::Conflict { .. }) => {
                    "The request clashes with the current state of the room."
                }
                CollabError::Database(DatabaseError::Exhausted) | CollabError::NoTracksLeft => {
                    "Add tracks to a queue with the add command."
                }
                CollabError::Song(SongError::NotFound(_)) => {
                    "Use the tracks command to find what the catalog has."
                }
                CollabError::Database(DatabaseError::Integrity(_)) => {
                    "Stored state is inconsistent. This is a bug, please report it."
                }
                _ => "This is a database error. Try again, and report it if it keeps happening.",
            },
            AppError::Fatal(_) => "This error is fatal, and should not happen.",
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("radiotation-async")
        .build()
        .map_err(|e| AppError::Fatal(e.to_string()))?;

    runtime.block_on(execute(cli))
}

async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = Config::default();

    let songs = match &cli.catalog {
        Some(path) => {
            let catalog = Catalog::from_file(path).map_err(AppError::Catalog)?;
            info!("Loaded {} tracks from {}", catalog.len(), path.display());
            catalog
        }
        None => {
            warn!("No catalog given, nothing can be queued");
            Catalog::default()
        }
    };

    let database = SqliteDatabase::open(&cli.database, config.clone())
        .await
        .map_err(AppError::Database)?;

    let collab = Collab::new(config, database, songs, LogHub);
    let output = Output { json: cli.json };

    let result = cli::execute(cli.command, &collab, &output).await;
    collab.shutdown().await;

    Ok(result?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{}", "radiotation failed!".bold().red());
            error!("{}", error);
            error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());

            ExitCode::FAILURE
        }
    }
}
