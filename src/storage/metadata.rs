/// Metadata persistence for sequence records
///
/// The importer only needs `save`; lookup is there for the CLI and tests.
use crate::bio::sequence::SequenceRecord;
use crate::error::{ImportError, ImportResult};
use dashmap::DashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub trait MetadataStore: Send + Sync {
    /// Persist the record, replacing any previous version with the same id
    fn save(&self, record: &SequenceRecord) -> ImportResult<SequenceRecord>;

    fn find(&self, id: Uuid) -> ImportResult<Option<SequenceRecord>>;
}

/// Process-local store, used when records live elsewhere or in tests
#[derive(Default)]
pub struct InMemoryMetadataStore {
    records: DashMap<Uuid, SequenceRecord>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn save(&self, record: &SequenceRecord) -> ImportResult<SequenceRecord> {
        self.records.insert(record.id, record.clone());
        Ok(record.clone())
    }

    fn find(&self, id: Uuid) -> ImportResult<Option<SequenceRecord>> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }
}

/// One pretty-printed JSON file per record, replaced atomically on save
pub struct JsonMetadataStore {
    dir: PathBuf,
}

impl JsonMetadataStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> ImportResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| ImportError::storage(format!("creating metadata dir {}", dir.display()), e))?;
        Ok(Self { dir })
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

impl MetadataStore for JsonMetadataStore {
    fn save(&self, record: &SequenceRecord) -> ImportResult<SequenceRecord> {
        let path = self.record_path(record.id);
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(record)?;

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &path)
        };
        if let Err(e) = write() {
            let err = ImportError::storage(format!("saving record {}", record.id), e);
            return Err(match fs::remove_file(&tmp_path) {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                    err.with_cleanup_failure(cleanup)
                }
                _ => err,
            });
        }

        tracing::debug!("Saved record {} to {}", record.id, path.display());
        Ok(record.clone())
    }

    fn find(&self, id: Uuid) -> ImportResult<Option<SequenceRecord>> {
        let path = self.record_path(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ImportError::storage(format!("reading record {}", id), e)),
        }
    }
}
