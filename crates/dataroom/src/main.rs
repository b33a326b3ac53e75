//! Dataroom CLI - encrypted document storage operations
//!
//! This is the main entry point for the dataroom command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Put(args) => commands::object::put(args, config).await,
        Commands::Get(args) => commands::object::get(args, config).await,
        Commands::Rm(args) => commands::object::rm(args, config).await,
        Commands::Ls(args) => commands::object::ls(args, config).await,
        Commands::Info(args) => commands::object::info(args, config).await,
        Commands::Cp(args) => commands::object::cp(args, config).await,
        Commands::SignUrl(args) => commands::url::sign(args, config).await,
        Commands::VerifyUrl(args) => commands::url::verify(args, config),
        Commands::Hash(args) => commands::crypto::hash(args).await,
        Commands::Keygen(args) => commands::crypto::keygen(args),
        Commands::Config(cmd) => commands::config::run(cmd, config),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
