/// Common test utilities for seqimport integration tests
///
/// Each test gets its own temporary storage root; nothing touches the user's
/// data directory.
use seqimport::config::Config;
use seqimport::storage::{InMemoryMetadataStore, SequenceDataRepository};
use seqimport::utils::parallel::WorkerPool;
use seqimport::SequenceImporter;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Test environment that owns a temporary storage root
pub struct TestEnvironment {
    _temp_dir: TempDir,
    pub root: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join("seqimport_test");

        TestEnvironment {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// Config rooted in this environment with a small, fixed pool
    #[allow(dead_code)]
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.storage.root_dir = self.root.clone();
        config.processing.threads = 2;
        config
    }

    /// Importer backed by an in-memory metadata store, staging lines of at
    /// most `line_length` bytes
    pub fn importer(&self, line_length: usize) -> (SequenceImporter, Arc<InMemoryMetadataStore>) {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let data = SequenceDataRepository::new(self.root.join("data"), line_length)
            .expect("Failed to open sequence storage");
        let importer = SequenceImporter::new(
            WorkerPool::new(2).expect("Failed to start pool"),
            Arc::new(data),
            metadata.clone(),
        );
        (importer, metadata)
    }

    /// Write an input file under the environment and return its path
    #[allow(dead_code)]
    pub fn write_input(&self, name: &str, contents: &str) -> PathBuf {
        let dir = self.root.join("inputs");
        std::fs::create_dir_all(&dir).expect("Failed to create input dir");
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("Failed to write input");
        path
    }
}
