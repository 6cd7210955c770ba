pub mod config;
pub mod fetch;
pub mod import;
pub mod show;

use crate::config::Config;
use crate::storage::metadata::JsonMetadataStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Directory holding one JSON file per record, under the storage root
pub fn records_dir(config: &Config) -> PathBuf {
    config.storage.root_dir.join("records")
}

pub fn open_metadata_store(config: &Config) -> anyhow::Result<Arc<JsonMetadataStore>> {
    Ok(Arc::new(JsonMetadataStore::new(records_dir(config))?))
}
