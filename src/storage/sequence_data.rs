//! File storage for staged raw uploads and canonical sequence payloads.
//!
//! Files are keyed by buffer id plus a format suffix and are create-once:
//! writing to an id that already has a file is a caller bug. A failed write
//! removes the partial file before the error is returned.

use crate::error::{ImportError, ImportResult};
use crate::processing::chunker::{ChunkPreprocessor, RawFormat};
use crate::processing::normalizer::read_lines_lossy;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Default shared CPU cache budget used to size staged lines
pub const SHARED_CPU_CACHE: usize = 3_000_000;

pub struct SequenceDataRepository {
    storage_dir: PathBuf,
    chunker: ChunkPreprocessor,
}

impl SequenceDataRepository {
    /// Open the repository, creating `storage_dir` if needed
    pub fn new<P: AsRef<Path>>(storage_dir: P, max_line_length: usize) -> ImportResult<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        if !storage_dir.exists() {
            fs::create_dir_all(&storage_dir).map_err(|e| {
                ImportError::storage(
                    format!("creating sequence dir {}", storage_dir.display()),
                    e,
                )
            })?;
        }
        Ok(Self {
            storage_dir,
            chunker: ChunkPreprocessor::new(max_line_length),
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn max_line_length(&self) -> usize {
        self.chunker.max_line_length()
    }

    /// Path of the staged raw file for `format`
    pub fn raw_path(&self, buffer_id: Uuid, format: RawFormat) -> PathBuf {
        self.storage_dir
            .join(format!("{}.{}", buffer_id, format.suffix()))
    }

    /// Path of the canonical payload (no suffix)
    pub fn payload_path(&self, buffer_id: Uuid) -> PathBuf {
        self.storage_dir.join(buffer_id.to_string())
    }

    pub fn raw_exists(&self, buffer_id: Uuid, format: RawFormat) -> bool {
        self.raw_path(buffer_id, format).exists()
    }

    pub fn payload_exists(&self, buffer_id: Uuid) -> bool {
        self.payload_path(buffer_id).exists()
    }

    /// Stage raw lines, re-chunked for parallel processing.
    ///
    /// `lines` is consumed and dropped before this returns, on success and on
    /// failure alike, which closes whatever source backs it.
    pub fn save_raw<I>(&self, buffer_id: Uuid, format: RawFormat, lines: I) -> ImportResult<PathBuf>
    where
        I: IntoIterator<Item = ImportResult<String>>,
    {
        let path = self.raw_path(buffer_id, format);
        let file = create_once(&path)?;

        let result = {
            let lines = lines.into_iter();
            let mut writer = BufWriter::new(file);
            self.chunker.process(format, lines, &mut writer)
        };

        match result {
            Ok(staged_lines) => {
                tracing::debug!(
                    "Staged {} line(s) for buffer {} at {}",
                    staged_lines,
                    buffer_id,
                    path.display()
                );
                Ok(path)
            }
            Err(e) => Err(remove_partial(&path, e)),
        }
    }

    /// Stage raw data from an uploaded stream
    pub fn save_raw_reader<R: Read>(
        &self,
        buffer_id: Uuid,
        format: RawFormat,
        reader: R,
    ) -> ImportResult<PathBuf> {
        let lines = read_lines_lossy(BufReader::new(reader))
            .map(|line| line.map_err(|e| ImportError::storage("reading uploaded data", e)));
        self.save_raw(buffer_id, format, lines)
    }

    /// Stream the staged lines back
    pub fn load_raw_lines(
        &self,
        buffer_id: Uuid,
        format: RawFormat,
    ) -> ImportResult<impl Iterator<Item = ImportResult<String>>> {
        let path = self.raw_path(buffer_id, format);
        let file = File::open(&path).map_err(|e| {
            ImportError::storage(format!("opening staged file {}", path.display()), e)
        })?;
        Ok(read_lines_lossy(BufReader::new(file))
            .map(|line| line.map_err(|e| ImportError::storage("reading staged file", e))))
    }

    /// Best-effort removal of a staged file; failures are only logged
    pub fn delete_raw(&self, buffer_id: Uuid, format: RawFormat) {
        let path = self.raw_path(buffer_id, format);
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!(
                "Delete staged sequence data with format {} failed: {}",
                format.suffix(),
                e
            );
        }
    }

    /// Write canonical buffers, in order, as one flat payload.
    ///
    /// Pulling from `buffers` happens here, so this call drives any lazy
    /// transformation behind it. Returns the number of bytes written.
    pub fn save<I>(&self, buffer_id: Uuid, buffers: I) -> ImportResult<u64>
    where
        I: IntoIterator<Item = ImportResult<Arc<[u8]>>>,
    {
        let path = self.payload_path(buffer_id);
        let file = create_once(&path)?;

        let result = (|| -> ImportResult<u64> {
            let mut writer = BufWriter::new(file);
            let mut written = 0u64;
            for buffer in buffers {
                let buffer = buffer?;
                writer
                    .write_all(&buffer)
                    .map_err(|e| ImportError::storage("writing sequence payload", e))?;
                written += buffer.len() as u64;
            }
            writer
                .flush()
                .map_err(|e| ImportError::storage("flushing sequence payload", e))?;
            Ok(written)
        })();

        result.map_err(|e| remove_partial(&path, e))
    }

    /// Read a canonical payload back
    pub fn load(&self, buffer_id: Uuid) -> ImportResult<Vec<u8>> {
        let path = self.payload_path(buffer_id);
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                ImportError::NotFound(format!("sequence payload {}", buffer_id))
            }
            _ => ImportError::storage(format!("reading payload {}", path.display()), e),
        })
    }

    /// Remove a canonical payload
    pub fn delete(&self, buffer_id: Uuid) -> ImportResult<()> {
        let path = self.payload_path(buffer_id);
        fs::remove_file(&path)
            .map_err(|e| ImportError::storage(format!("deleting payload {}", path.display()), e))
    }
}

fn create_once(path: &Path) -> ImportResult<File> {
    debug_assert!(!path.exists(), "sequence data file can't be overwritten: {}", path.display());
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| ImportError::storage(format!("creating {}", path.display()), e))
}

/// Delete a partially written file, keeping `primary` as the reported error
fn remove_partial(path: &Path, primary: ImportError) -> ImportError {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed partial file {}", path.display());
            primary
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => primary,
        Err(e) => primary.with_cleanup_failure(io::Error::new(
            e.kind(),
            format!("emergency deletion of {} failed: {}", path.display(), e),
        )),
    }
}
