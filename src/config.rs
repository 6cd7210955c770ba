//! Configuration types for sequence ingestion

use crate::error::{ImportError, ImportResult};
use crate::storage::sequence_data::SHARED_CPU_CACHE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Endpoint queried with `db`, `id`, `retmode` and `rettype`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_db")]
    pub db: String,
    #[serde(default = "default_retmode")]
    pub retmode: String,
    #[serde(default = "default_rettype")]
    pub rettype: String,
    /// Minimum time between the end of one successful fetch and the start of the next
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TlsConfig {
    /// Skip certificate and hostname verification. Only for endpoints with
    /// broken chains that cannot be fixed with `ca_certificate`.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Extra PEM trust root, e.g. a missing intermediate
    #[serde(default)]
    pub ca_certificate: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding staged uploads and canonical payloads
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Shared CPU cache budget split across workers to size staged lines
    #[serde(default = "default_shared_cache_bytes")]
    pub shared_cache_bytes: usize,
    /// Worker threads (0 = hardware parallelism)
    #[serde(default)]
    pub threads: usize,
    /// Buffers shorter than this update the shared counters directly
    #[serde(default = "default_small_buffer_threshold")]
    pub small_buffer_threshold: usize,
}

// Default value functions
fn default_base_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi".to_string()
}
fn default_db() -> String { "nuccore".to_string() }
fn default_retmode() -> String { "text".to_string() }
fn default_rettype() -> String { "fasta".to_string() }
fn default_min_interval_ms() -> u64 { 334 }
fn default_timeout_secs() -> u64 { 300 }
fn default_max_redirects() -> usize { 10 }
fn default_user_agent() -> String { format!("seqimport/{}", env!("CARGO_PKG_VERSION")) }
fn default_shared_cache_bytes() -> usize { SHARED_CPU_CACHE }
fn default_small_buffer_threshold() -> usize { 200 }

fn default_root_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("seqimport")
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            db: default_db(),
            retmode: default_retmode(),
            rettype: default_rettype(),
            min_interval_ms: default_min_interval_ms(),
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            tls: TlsConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            shared_cache_bytes: default_shared_cache_bytes(),
            threads: 0,
            small_buffer_threshold: default_small_buffer_threshold(),
        }
    }
}

impl FetchConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProcessingConfig {
    /// Resolved worker count
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

impl Config {
    /// Check the values that cannot be caught by deserialization
    pub fn validate(&self) -> ImportResult<()> {
        let fetch = &self.fetch;
        let url = url::Url::parse(&fetch.base_url).map_err(|e| {
            ImportError::Configuration(format!("Invalid fetch.base_url '{}': {}", fetch.base_url, e))
        })?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ImportError::Configuration(format!(
                "fetch.base_url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        for (name, value) in [("db", &fetch.db), ("retmode", &fetch.retmode), ("rettype", &fetch.rettype)] {
            if value.trim().is_empty() {
                return Err(ImportError::Configuration(format!("fetch.{} must not be empty", name)));
            }
        }
        if fetch.max_redirects == 0 {
            return Err(ImportError::Configuration(
                "fetch.max_redirects must be at least 1".to_string(),
            ));
        }
        if let Some(ca) = &fetch.tls.ca_certificate {
            if !ca.is_file() {
                return Err(ImportError::Configuration(format!(
                    "fetch.tls.ca_certificate does not exist: {}",
                    ca.display()
                )));
            }
        }
        if self.processing.shared_cache_bytes == 0 {
            return Err(ImportError::Configuration(
                "processing.shared_cache_bytes must be positive".to_string(),
            ));
        }
        if self.storage.root_dir.as_os_str().is_empty() {
            return Err(ImportError::Configuration(
                "storage.root_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the storage root if it does not exist yet
    pub fn ensure_storage_dir(&self) -> ImportResult<PathBuf> {
        let dir = &self.storage.root_dir;
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| {
                ImportError::storage(format!("creating storage dir {}", dir.display()), e)
            })?;
            tracing::info!("Created storage directory {}", dir.display());
        }
        Ok(dir.clone())
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> ImportResult<Config> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| ImportError::Configuration(format!("Failed to parse config: {}", e)))?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> ImportResult<()> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| ImportError::Configuration(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}
