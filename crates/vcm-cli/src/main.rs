//! vcmon CLI binary entrypoint.
//!
//! This is the main entry point for the `vcmon` command-line tool.

use std::io::{self, Read, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vcm_cli::cli::{Cli, Commands};
use vcm_cli::commands::{CatalogCommand, IngestCommand, QueryCommand, QueryKind};
use vcm_cli::output::OutputFormat;
use vcm_metrics::{ClusterStore, QueryService};

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut stdout = io::stdout().lock();
    match run(cli, &mut stdout, io::stdin().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}

fn run<W: Write, R: Read>(cli: Cli, out: &mut W, input: R) -> Result<(), vcm_cli::CliError> {
    let config = cli.store_config()?;
    let format = OutputFormat::new(cli.format);
    let store = ClusterStore::open(&config)?;

    let result = dispatch(cli.command, &store, &config.query, out, &format, input);
    let closed = store.close();

    result?;
    closed?;
    Ok(())
}

fn dispatch<W: Write, R: Read>(
    command: Commands,
    store: &ClusterStore,
    defaults: &vcm_metrics::QueryConfig,
    out: &mut W,
    format: &OutputFormat,
    input: R,
) -> Result<(), vcm_cli::CliError> {
    let queries = QueryService::new(store.clone());

    match command {
        Commands::Ingest(args) => {
            let cmd = IngestCommand::new(store);
            cmd.execute(out, format, &args, input)?;
        }
        Commands::Latest(series) => {
            let cmd = QueryCommand::new(&queries, defaults);
            cmd.execute(out, format, &series, QueryKind::Latest)?;
        }
        Commands::Recent { series, n } => {
            let cmd = QueryCommand::new(&queries, defaults);
            cmd.execute(out, format, &series, QueryKind::Recent { n })?;
        }
        Commands::Range { series, minutes } => {
            let cmd = QueryCommand::new(&queries, defaults);
            cmd.execute(out, format, &series, QueryKind::Range { minutes })?;
        }
        Commands::History { series, minutes } => {
            let cmd = QueryCommand::new(&queries, defaults);
            cmd.execute(out, format, &series, QueryKind::History { minutes })?;
        }
        Commands::Clusters => {
            let cmd = CatalogCommand::new(&queries);
            cmd.clusters(out, format)?;
        }
        Commands::Labels { cluster } => {
            let cmd = CatalogCommand::new(&queries);
            cmd.labels(out, format, &cluster)?;
        }
    }

    Ok(())
}
