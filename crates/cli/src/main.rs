mod error_presentation;
mod output;

use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use mylite_core::{ConnectionConfig, EngineConfig, split_script};
use mylite_sqlite::open_engine;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error_presentation::{CliError, CliResult, render_runtime_error};

const SERVER_VERSION_KEY: &str = "sqlite.server_version";

/// Run MySQL-dialect SQL against an embedded SQLite database.
#[derive(Debug, Parser)]
#[command(name = "mylite", version)]
struct Cli {
    /// Database file path, or `:memory:`.
    #[arg(long, env = "MYLITE_DATABASE", default_value = ":memory:")]
    database: String,

    /// Read statements from this file instead of stdin.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Report this engine version instead of the linked one.
    #[arg(long, env = "MYLITE_SERVER_VERSION", value_name = "VERSION")]
    server_version: Option<String>,

    /// Append raw, rewritten and executed statement text to this file.
    #[arg(long, env = "MYLITE_TRACE_FILE", value_name = "PATH")]
    trace_file: Option<PathBuf>,

    /// Attempts per statement while the database is locked.
    #[arg(long, env = "MYLITE_MAX_RETRIES", value_name = "N")]
    max_retries: Option<u32>,

    /// Never split multi-row inserts into this table. Repeatable.
    #[arg(long = "atomic-table", value_name = "TABLE")]
    atomic_tables: Vec<String>,
}

impl Cli {
    fn connection(&self) -> ConnectionConfig {
        let connection = ConnectionConfig::new(self.database.clone());
        match &self.server_version {
            Some(version) => connection.with_extra(SERVER_VERSION_KEY, version.clone()),
            None => connection,
        }
    }

    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig {
            atomic_insert_tables: self.atomic_tables.clone(),
            trace_file: self.trace_file.clone(),
            ..EngineConfig::default()
        };
        if let Some(attempts) = self.max_retries {
            config.retry.max_attempts = attempts;
            config.ddl_retry.max_attempts = attempts;
        }
        config
    }

    fn read_script(&self) -> CliResult<String> {
        match &self.file {
            Some(path) => fs::read_to_string(path).map_err(|source| CliError::ReadFile {
                path: path.clone(),
                source,
            }),
            None => {
                let mut script = String::new();
                io::stdin()
                    .read_to_string(&mut script)
                    .map_err(CliError::ReadStdin)?;
                Ok(script)
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", render_runtime_error(error));
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
}

/// Runs every statement of the script in order and stops at the first
/// failure.
fn run(cli: &Cli) -> CliResult<()> {
    let script = cli.read_script()?;
    let mut engine =
        open_engine(&cli.connection(), cli.engine_config()).map_err(|source| CliError::Connect {
            database: cli.database.clone(),
            source,
        })?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (index, statement) in split_script(&script).iter().enumerate() {
        debug!(index, statement = %statement, "running statement");
        let outcome = engine.query(statement);
        if let Some(error) = outcome.error {
            return Err(CliError::Statement { index, error });
        }
        output::write_outcome(&mut out, &outcome).map_err(CliError::WriteOutput)?;
    }
    out.flush().map_err(CliError::WriteOutput)
}
