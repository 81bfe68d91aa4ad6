use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use stealthy_cleaner::{
    APP_NAME, cleanup,
    config::{CleanerConfig, ConfigError, LoggingConfig},
    db::{self, DbError, FilesRepo, MongoFilesRepo},
    observability,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// CLI arguments for the cleaner
#[derive(Parser, Debug)]
#[command(version, about = "Deletes expired file records from MongoDB", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the settings file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Path to the logging config file
    #[arg(short, long, global = true, default_value = "logging.toml")]
    logging_config: PathBuf,
}

#[derive(clap::Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the cleanup loop until interrupted (default)
    Run,
    /// Load the settings and check the database connection, then exit
    Check,
    /// Run a single cleanup tick, then exit
    Once,
}

/// Errors that stop the program.
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create database client: {0}")]
    Database(#[from] DbError),

    #[error("Connectivity check failed: {0}")]
    Connectivity(#[source] DbError),

    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),

    #[error("Cleanup loop aborted: {0}")]
    LoopAborted(#[from] tokio::task::JoinError),

    #[error("Cleanup tick failed")]
    TickFailed,
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.kind(),
            AppError::Database(e) | AppError::Connectivity(e) => e.kind(),
            AppError::Signal(_) => "signal",
            AppError::LoopAborted(_) => "task",
            AppError::TickFailed => "tick",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let logging = match LoggingConfig::from_file(&args.logging_config) {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!(
                "Failed to load logging config from {}: {e}",
                args.logging_config.display()
            );
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = observability::init_tracing(&logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let span = tracing::info_span!("cleaner", app_name = APP_NAME);
    async move {
        let outcome = run(args).await;
        if let Err(e) = &outcome {
            tracing::error!(
                error_type = e.kind(),
                error_message = %e,
                "Critical error"
            );
        }
        tracing::info!("Program stopped");

        match outcome {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        }
    }
    .instrument(span)
    .await
}

async fn run(args: Args) -> Result<(), AppError> {
    tracing::info!(path = %args.config.display(), "Loading configuration");
    let config = CleanerConfig::from_file(&args.config)?;
    // The URL may embed credentials, so it is never logged.
    tracing::info!(
        database = %config.mongo_db.database,
        seconds_timeout = config.mongo_db.seconds_timeout,
        seconds_period = config.cleanup.seconds_period,
        remove_batch_size = config.cleanup.remove_batch_size,
        "Configuration loaded"
    );

    let repo: Arc<dyn FilesRepo> = Arc::new(MongoFilesRepo::connect(&config.mongo_db).await?);
    db::check_connection(repo.as_ref(), config.mongo_db.timeout())
        .await
        .map_err(AppError::Connectivity)?;

    match args.command.unwrap_or(Command::Run) {
        Command::Check => {
            tracing::info!("Database connection OK");
            Ok(())
        }
        Command::Once => cleanup::clean_tick(repo.as_ref(), &config.cleanup)
            .await
            .map(|_| ())
            .ok_or(AppError::TickFailed),
        Command::Run => run_until_signal(repo, config).await,
    }
}

/// Run the cleanup loop until SIGINT or SIGTERM, then let the current tick
/// finish before returning.
async fn run_until_signal(
    repo: Arc<dyn FilesRepo>,
    config: CleanerConfig,
) -> Result<(), AppError> {
    let cancel = CancellationToken::new();
    let mut worker = tokio::spawn(
        cleanup::run_cleanup_loop(repo, config.cleanup, cancel.clone()).in_current_span(),
    );

    tokio::select! {
        signal = shutdown_signal() => {
            if signal.is_ok() {
                tracing::info!("Program interrupted");
            }
            cancel.cancel();
            worker.await?;
            signal.map_err(AppError::Signal)
        }
        joined = &mut worker => {
            joined?;
            Ok(())
        }
    }
}

async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = {
        let mut signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        async move {
            signal.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = ctrl_c => result,
        _ = terminate => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["stealthy-cleaner"]).unwrap();
        assert_eq!(args.command, None);
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert_eq!(args.logging_config, PathBuf::from("logging.toml"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "stealthy-cleaner",
            "once",
            "--config",
            "/etc/cleaner/config.toml",
            "-l",
            "/etc/cleaner/logging.toml",
        ])
        .unwrap();
        assert_eq!(args.command, Some(Command::Once));
        assert_eq!(args.config, PathBuf::from("/etc/cleaner/config.toml"));
        assert_eq!(args.logging_config, PathBuf::from("/etc/cleaner/logging.toml"));
    }

    #[test]
    fn test_error_kinds() {
        let err = AppError::from(ConfigError::Validation("bad".into()));
        assert_eq!(err.kind(), "validation");
        let err = AppError::Connectivity(DbError::Unavailable("down".into()));
        assert_eq!(err.kind(), "unavailable");
        assert_eq!(AppError::TickFailed.kind(), "tick");
    }
}
