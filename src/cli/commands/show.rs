use crate::cli::commands::open_metadata_store;
use crate::cli::formatter::print_record;
use crate::config::Config;
use crate::error::ImportError;
use crate::storage::metadata::MetadataStore;
use clap::Args;
use uuid::Uuid;

#[derive(Args)]
pub struct ShowArgs {
    /// Record id
    #[arg(value_name = "ID")]
    pub id: Uuid,

    /// Print the record as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ShowArgs, config: &Config) -> anyhow::Result<()> {
    let store = open_metadata_store(config)?;
    let record = store
        .find(args.id)?
        .ok_or_else(|| ImportError::NotFound(format!("sequence record {}", args.id)))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}
