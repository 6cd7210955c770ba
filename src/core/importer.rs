//! Ingestion of one sequence payload.
//!
//! Staged data is read back line by line, cleaned on the worker pool and
//! written to the canonical payload. The storage write pulls every buffer;
//! counting and length accumulation ride along on that same pass.

use crate::bio::sequence::SequenceRecord;
use crate::config::Config;
use crate::download::ncbi::NcbiFetcher;
use crate::error::{ImportError, ImportResult};
use crate::processing::chunker::RawFormat;
use crate::processing::counter::{NucleicCounter, DEFAULT_SMALL_BUFFER_THRESHOLD};
use crate::processing::normalizer::{FastaLines, ParallelCleaner};
use crate::storage::metadata::MetadataStore;
use crate::storage::sequence_data::SequenceDataRepository;
use crate::utils::parallel::WorkerPool;
use std::io::Read;
use std::sync::Arc;

pub struct SequenceImporter {
    pool: WorkerPool,
    data: Arc<SequenceDataRepository>,
    metadata: Arc<dyn MetadataStore>,
    small_buffer_threshold: usize,
}

impl SequenceImporter {
    pub fn new(
        pool: WorkerPool,
        data: Arc<SequenceDataRepository>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            pool,
            data,
            metadata,
            small_buffer_threshold: DEFAULT_SMALL_BUFFER_THRESHOLD,
        }
    }

    /// Pool, sequence storage and thresholds built from `config`
    pub fn from_config(config: &Config, metadata: Arc<dyn MetadataStore>) -> ImportResult<Self> {
        config.validate()?;
        let root = config.ensure_storage_dir()?;
        let pool = WorkerPool::new(config.processing.worker_threads())?;
        let line_length = pool.chunk_target(config.processing.shared_cache_bytes);
        let data = SequenceDataRepository::new(root, line_length)?;

        tracing::info!(
            "Importer ready: {} workers, staged line target {} bytes",
            pool.current_num_threads(),
            line_length
        );
        Ok(Self::new(pool, Arc::new(data), metadata)
            .with_small_buffer_threshold(config.processing.small_buffer_threshold))
    }

    pub fn with_small_buffer_threshold(mut self, threshold: usize) -> Self {
        self.small_buffer_threshold = threshold;
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn data(&self) -> &Arc<SequenceDataRepository> {
        &self.data
    }

    /// Stage an uploaded stream, then ingest it
    pub fn import_reader<R: Read>(
        &self,
        record: SequenceRecord,
        format: RawFormat,
        reader: R,
    ) -> ImportResult<SequenceRecord> {
        self.data.save_raw_reader(record.buffer_id, format, reader)?;
        self.process_staged(record, format)
    }

    /// Fetch `accession` remotely, stage the response, then ingest it.
    ///
    /// The connection is closed, and the fetch token released, as soon as
    /// staging finishes.
    pub fn import_accession(
        &self,
        mut record: SequenceRecord,
        fetcher: &NcbiFetcher,
        accession: &str,
    ) -> ImportResult<SequenceRecord> {
        let format = fetcher.raw_format();
        let lines = fetcher.fetch(accession)?;
        self.data.save_raw(record.buffer_id, format, lines)?;

        record.ncbi = Some(accession.to_string());
        self.process_staged(record, format)
    }

    /// Ingest data already staged under `record.buffer_id`.
    ///
    /// On success the completed record is saved to the metadata store and
    /// returned. On failure nothing is saved, so the stored record keeps its
    /// pre-ingestion state. The staged file is removed either way.
    pub fn process_staged(
        &self,
        record: SequenceRecord,
        format: RawFormat,
    ) -> ImportResult<SequenceRecord> {
        let buffer_id = record.buffer_id;
        let result = self.pool.install(|| self.ingest(record, format));
        self.data.delete_raw(buffer_id, format);

        match &result {
            Ok(saved) => tracing::info!(
                "Imported sequence {} ({} bp)",
                saved.name,
                saved.length().unwrap_or(0)
            ),
            Err(e) => tracing::error!("Import of buffer {} failed: {}", buffer_id, e),
        }
        result
    }

    fn ingest(&self, mut record: SequenceRecord, format: RawFormat) -> ImportResult<SequenceRecord> {
        let lines = self.data.load_raw_lines(record.buffer_id, format)?;
        let counter = NucleicCounter::with_threshold(self.pool.clone(), self.small_buffer_threshold);
        let mut comment = String::new();
        let mut length = 0u64;

        let written = {
            let cleaned: Box<dyn Iterator<Item = ImportResult<Vec<u8>>> + '_> = match format {
                RawFormat::Fasta => Box::new(ParallelCleaner::new(
                    FastaLines::new(lines, &mut comment),
                    &self.pool,
                )),
                RawFormat::Plain => Box::new(ParallelCleaner::new(lines, &self.pool)),
            };
            let buffers = cleaned.map(|buffer| {
                buffer.map(|buffer| {
                    let buffer: Arc<[u8]> = Arc::from(buffer);
                    length += buffer.len() as u64;
                    counter.submit(Arc::clone(&buffer));
                    buffer
                })
            });
            self.data.save(record.buffer_id, buffers)
        };

        // Outstanding counting tasks still finish before the error surfaces
        let counts = match written {
            Ok(_) => counter.drain()?,
            Err(e) => {
                if let Err(drain_err) = counter.drain() {
                    tracing::warn!("Counting after failed write: {}", drain_err);
                }
                return Err(e);
            }
        };

        record.complete(length, counts);
        if format == RawFormat::Fasta {
            record.set_fasta_comment(comment);
        }

        self.metadata.save(&record).map_err(|e| {
            match self.data.delete(record.buffer_id) {
                Err(ImportError::Storage { source, .. }) => e.with_cleanup_failure(source),
                _ => e,
            }
        })
    }
}
