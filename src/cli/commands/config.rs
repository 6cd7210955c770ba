use crate::cli::default_config_path;
use crate::cli::formatter::{print_success, print_warning};
use crate::config::{save_config, Config};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the configuration to this file instead of printing it
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write to the default configuration path
    #[arg(long, conflicts_with = "output")]
    pub save: bool,
}

pub fn run(args: ConfigArgs, config: &Config) -> anyhow::Result<()> {
    let target = if args.save {
        match default_config_path() {
            Some(path) => Some(path),
            None => anyhow::bail!("No configuration directory on this platform"),
        }
    } else {
        args.output
    };

    match target {
        Some(path) => {
            if path.exists() {
                print_warning(&format!("Overwriting {}", path.display()));
            } else if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            save_config(&path, config)?;
            print_success(&format!("Configuration written to {}", path.display()));
        }
        None => print!("{}", toml::to_string_pretty(config)?),
    }
    Ok(())
}
