pub mod bio;
pub mod cli;
pub mod config;
pub mod core;
pub mod download;
pub mod error;
pub mod processing;
pub mod storage;
pub mod utils;

pub use crate::bio::{Nucleic, SequenceRecord, SequenceType};
pub use crate::config::Config;
pub use crate::core::SequenceImporter;
pub use crate::error::{ImportError, ImportResult};
