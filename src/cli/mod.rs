pub mod commands;
pub mod formatter;

use crate::config::{load_config, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "seqimport",
    version,
    about = "Import nucleic acid sequences into canonical storage",
    long_about = "seqimport stages FASTA or plain sequence text from a local file or a remote \
                  accession, normalizes it to canonical IUPAC symbols, stores the payload and \
                  records its length and per-symbol counts."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true, env = "SEQIMPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of threads to use (0 = value from config, else all available)
    #[arg(short = 'j', long, default_value = "0", global = true)]
    pub threads: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a local FASTA or plain sequence file
    Import(commands::import::ImportArgs),

    /// Fetch an accession from the remote database and import it
    Fetch(commands::fetch::FetchArgs),

    /// Show a stored sequence record
    Show(commands::show::ShowArgs),

    /// Print or write the effective configuration
    Config(commands::config::ConfigArgs),
}

/// Default location of the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("seqimport").join("config.toml"))
}

/// Resolve the configuration for this invocation.
///
/// An explicit `--config` must exist; the default file is optional. A
/// non-zero `-j` overrides the configured thread count.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => match default_config_path().filter(|path| path.exists()) {
            Some(path) => {
                tracing::debug!("Using config file {}", path.display());
                load_config(path)?
            }
            None => Config::default(),
        },
    };

    if cli.threads > 0 {
        config.processing.threads = cli.threads;
    }
    config.validate()?;
    Ok(config)
}
