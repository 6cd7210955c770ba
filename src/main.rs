use clap::Parser;
use colored::*;
use seqimport::cli::{resolve_config, Cli, Commands};
use seqimport::ImportError;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize logging with SEQIMPORT_LOG environment variable support
    let log_level = std::env::var("SEQIMPORT_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);

        // Use appropriate exit codes based on error type
        let exit_code = match e.downcast_ref::<ImportError>() {
            Some(ImportError::Configuration(_)) => 2,
            Some(ImportError::Storage { .. }) | Some(ImportError::Io(_)) => 3,
            Some(ImportError::FormatViolation(_)) => 4,
            Some(ImportError::Transport { .. }) => 5,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;

    if cli.verbose > 0 {
        eprintln!(
            "Using {} threads, storage at {}",
            config.processing.worker_threads(),
            config.storage.root_dir.display()
        );
    }

    match cli.command {
        Commands::Import(args) => seqimport::cli::commands::import::run(args, &config),
        Commands::Fetch(args) => seqimport::cli::commands::fetch::run(args, &config),
        Commands::Show(args) => seqimport::cli::commands::show::run(args, &config),
        Commands::Config(args) => seqimport::cli::commands::config::run(args, &config),
    }
}
