use crate::bio::nucleic::SequenceType;
use crate::bio::sequence::SequenceRecord;
use crate::cli::commands::open_metadata_store;
use crate::cli::formatter::{print_record, print_success};
use crate::config::Config;
use crate::core::SequenceImporter;
use crate::download::ncbi::NcbiFetcher;
use crate::storage::metadata::MetadataStore;
use clap::Args;

#[derive(Args)]
pub struct FetchArgs {
    /// Accession ids to fetch (e.g. NC_001416.1)
    #[arg(value_name = "ACCESSION", required = true)]
    pub accessions: Vec<String>,

    /// Sequence type (dna, rna)
    #[arg(short = 't', long = "type", default_value = "dna")]
    pub seq_type: SequenceType,

    /// Mark the sequences as circular
    #[arg(long)]
    pub circular: bool,

    /// Owner reference stored with the records
    #[arg(long)]
    pub owner: Option<String>,
}

pub fn run(args: FetchArgs, config: &Config) -> anyhow::Result<()> {
    let store = open_metadata_store(config)?;
    let importer = SequenceImporter::from_config(config, store.clone())?;
    let fetcher = NcbiFetcher::from_config(&config.fetch)?;

    for accession in &args.accessions {
        let mut record = SequenceRecord::new_pending(accession.clone(), args.seq_type)
            .with_circular(args.circular)
            .with_ncbi(accession.clone());
        if let Some(owner) = &args.owner {
            record = record.with_owner(owner.clone());
        }
        store.save(&record)?;

        let saved = importer.import_accession(record, &fetcher, accession)?;
        print_success(&format!("Fetched {}", accession));
        print_record(&saved);
    }
    Ok(())
}
