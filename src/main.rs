mod cli;
mod db;
mod detector;
mod error;
mod fmt;
mod grid;
mod header;
mod layout;
mod mapper;
mod models;
mod normalize;
mod pipeline;
mod reconcile;
mod settings;
mod storage;
mod table;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt as log_fmt, EnvFilter};

use cli::{Cli, Commands};
use settings::Paths;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            log_fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data_dir = cli.data_dir.as_deref();
    let result = match cli.command {
        Commands::Init => cli::init::run(data_dir),
        Commands::Process {
            file,
            store,
            batch_id,
        } => cli::process::run(&Paths::resolve(data_dir), &file, store, batch_id),
        Commands::Detect { file } => cli::detect::run(&Paths::resolve(data_dir), &file),
        Commands::Enrich { statement, report } => {
            cli::enrich::run(&Paths::resolve(data_dir), statement.as_deref(), report.as_deref())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
