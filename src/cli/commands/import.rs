use crate::bio::nucleic::SequenceType;
use crate::bio::sequence::SequenceRecord;
use crate::cli::commands::open_metadata_store;
use crate::cli::formatter::{print_record, print_success};
use crate::config::Config;
use crate::core::SequenceImporter;
use crate::processing::chunker::RawFormat;
use crate::storage::metadata::MetadataStore;
use anyhow::Context;
use clap::Args;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct ImportArgs {
    /// Input FASTA or plain sequence file
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Raw format (fasta, plain); guessed from the file extension if omitted
    #[arg(short, long)]
    pub format: Option<RawFormat>,

    /// Sequence type (dna, rna)
    #[arg(short = 't', long = "type", default_value = "dna")]
    pub seq_type: SequenceType,

    /// Record name (defaults to the file stem)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Mark the sequence as circular
    #[arg(long)]
    pub circular: bool,

    /// Owner reference stored with the record
    #[arg(long)]
    pub owner: Option<String>,

    /// Tag to attach (can be repeated)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

/// Format implied by a file extension, plain text when unknown
pub fn guess_format(path: &Path) -> RawFormat {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse().ok())
        .unwrap_or(RawFormat::Plain)
}

pub fn run(args: ImportArgs, config: &Config) -> anyhow::Result<()> {
    let format = args.format.unwrap_or_else(|| guess_format(&args.input));
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string()),
    };

    let store = open_metadata_store(config)?;
    let importer = SequenceImporter::from_config(config, store.clone())?;

    let mut record = SequenceRecord::new_pending(name, args.seq_type).with_circular(args.circular);
    if let Some(owner) = args.owner {
        record = record.with_owner(owner);
    }
    for tag in args.tags {
        record = record.with_tag(tag);
    }
    store.save(&record)?;

    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    tracing::info!(
        "Importing {} as {} ({})",
        args.input.display(),
        format.suffix(),
        record.seq_type
    );
    let saved = importer.import_reader(record, format, file)?;

    print_success(&format!("Imported {}", args.input.display()));
    print_record(&saved);
    Ok(())
}
