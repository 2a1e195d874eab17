//! soakctl CLI - concurrent jsonb query soak test for PostgreSQL
//!
//! Resets a small fixed table, then runs rounds of parallel
//! `select data from j` queries through a shared pool forever, decoding
//! every row and printing heap figures every 100,000 rounds. Any anomaly
//! stops the process with a non-zero exit status.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use soakctl_core::config::load_dotenv;
use soakctl_core::{
    create_pool, reset_schema, CountingAllocator, FileConfig, MemorySampler, Overrides,
    PgQueryWorker, RoundCoordinator, SoakConfig, SoakError, WORKERS_PER_ROUND,
};
use sqlx::PgPool;
use tracing::{debug, error, info};

mod tracing_setup;

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator::new();

#[derive(Parser, Debug)]
#[command(
    name = "soakctl",
    author,
    version,
    about = "Concurrent jsonb query soak test with periodic heap sampling",
    long_about = "Reset table `j`, then run rounds of 20 parallel queries through a pooled \
                  connection, decoding every row. Heap figures are printed to stdout every \
                  100000 rounds; the first anomaly terminates the process."
)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reset the schema, then query until failure or the round ceiling
    Run(RunArgs),
    /// Only reset the schema and seed the fixed rows
    Setup(DatabaseArgs),
}

#[derive(Args, Debug)]
struct DatabaseArgs {
    /// PostgreSQL connection string (overrides config files)
    #[arg(long, value_name = "URL", env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// TOML config file (default: ./soakctl.toml over ~/.soakctl/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    database: DatabaseArgs,

    /// Maximum pooled connections [default: 50]
    #[arg(long, value_name = "N")]
    max_connections: Option<u32>,

    /// Stop after this many rounds instead of running until failure
    #[arg(long, value_name = "N")]
    rounds: Option<u64>,
}

/// A fatal error plus the pool to close once it has been reported.
struct Failure {
    error: anyhow::Error,
    pool: Option<PgPool>,
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Self { error, pool: None }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // before parsing, so clap's `env` lookups see .env values
    let dotenv_files = load_dotenv();
    let cli = Cli::parse();

    let tracing_config = tracing_setup::TracingConfig { debug: cli.debug };
    let tracing_ready = match tracing_setup::init(&tracing_config) {
        Ok(()) => true,
        Err(err) => {
            eprintln!("failed to initialise tracing: {err:#}");
            false
        }
    };
    for path in &dotenv_files {
        debug!("Loaded environment from {}", path.display());
    }

    let outcome = match cli.command {
        Commands::Run(args) => run_soak(args).await,
        Commands::Setup(args) => run_setup(args).await.map_err(Failure::from),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => shutdown(failure, |err| report_fatal(err, tracing_ready)).await,
    }
}

/// Name of the failed operation, taken from the first `SoakError` in the chain.
fn failed_operation(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<SoakError>())
        .map_or("cli", SoakError::operation)
}

fn report_fatal(err: &anyhow::Error, tracing_ready: bool) {
    let operation = failed_operation(err);
    if tracing_ready {
        error!(operation, "{:#}", err);
    } else {
        eprintln!("{}", fallback_line(err, operation));
    }
}

/// Fatal line for stderr when no tracing subscriber is installed.
fn fallback_line(err: &anyhow::Error, operation: &str) -> String {
    format!("ERROR {:#} operation=\"{}\"", err, operation)
}

/// Report first, then close the pool: closing waits on connections the
/// aborted workers released, which a stalled server may never answer.
async fn shutdown(failure: Failure, report: impl FnOnce(&anyhow::Error)) -> ExitCode {
    report(&failure.error);
    if let Some(pool) = failure.pool {
        pool.close().await;
    }
    ExitCode::FAILURE
}

fn resolve_config(database: DatabaseArgs, overrides: Overrides) -> Result<SoakConfig> {
    let file = match &database.config {
        Some(path) => FileConfig::from_path(path)?,
        None => FileConfig::load()?,
    };
    let overrides = Overrides {
        database_url: database.database_url,
        ..overrides
    };

    SoakConfig::resolve(overrides, file).context("invalid configuration")
}

async fn run_setup(args: DatabaseArgs) -> Result<()> {
    let config = resolve_config(args, Overrides::default())?;
    reset_schema(&config.connect_options)
        .await
        .context("schema reset failed")
}

async fn run_soak(args: RunArgs) -> std::result::Result<(), Failure> {
    let config = resolve_config(
        args.database,
        Overrides {
            max_connections: args.max_connections,
            rounds: args.rounds,
            ..Overrides::default()
        },
    )?;

    info!(
        host = config.connect_options.get_host(),
        max_connections = config.max_connections,
        rounds = config.rounds,
        workers = WORKERS_PER_ROUND,
        "starting soak run"
    );

    let pool = create_pool(config.connect_options.clone(), config.max_connections)
        .await
        .context("connection pool initialisation failed")?;

    if let Err(err) = reset_schema(&config.connect_options).await {
        return Err(Failure {
            error: anyhow::Error::new(err).context("schema reset failed"),
            pool: Some(pool),
        });
    }

    let worker = Arc::new(PgQueryWorker::new(pool.clone()));
    let mut sampler = MemorySampler::stdout(&ALLOC);
    let summary = match RoundCoordinator::new(config.rounds)
        .run(worker, &mut sampler)
        .await
    {
        Ok(summary) => summary,
        Err(err) => {
            return Err(Failure {
                error: anyhow::Error::new(err).context("soak run failed"),
                pool: Some(pool),
            })
        }
    };

    pool.close().await;
    info!(
        rounds = summary.rounds,
        queries = summary.queries,
        samples = summary.samples,
        "soak run finished"
    );
    Ok(())
}
