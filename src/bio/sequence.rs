use crate::bio::nucleic::{Nucleic, SequenceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Sparse per-symbol histogram; zero counts are never stored
pub type NucleicCounts = BTreeMap<Nucleic, u64>;

/// Metadata for one imported sequence.
///
/// Created before ingestion with length and histogram unset. Both are applied
/// together by [`SequenceRecord::complete`] once ingestion succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub id: Uuid,
    /// Key of the canonical payload in sequence data storage
    pub buffer_id: Uuid,
    pub name: String,
    pub created: DateTime<Utc>,
    #[serde(rename = "type")]
    pub seq_type: SequenceType,
    pub circular: bool,
    length: Option<u64>,
    /// Accession id when the data came from a remote database
    pub ncbi: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub owner: Option<String>,
    pub fasta_comment: Option<String>,
    #[serde(default)]
    nucleic_counts: NucleicCounts,
}

impl SequenceRecord {
    pub fn new_pending(name: impl Into<String>, seq_type: SequenceType) -> Self {
        Self {
            id: Uuid::new_v4(),
            buffer_id: Uuid::new_v4(),
            name: name.into(),
            created: Utc::now(),
            seq_type,
            circular: false,
            length: None,
            ncbi: None,
            tags: BTreeSet::new(),
            owner: None,
            fasta_comment: None,
            nucleic_counts: NucleicCounts::new(),
        }
    }

    pub fn with_circular(mut self, circular: bool) -> Self {
        self.circular = circular;
        self
    }

    pub fn with_ncbi(mut self, accession: impl Into<String>) -> Self {
        self.ncbi = Some(accession.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Stored length, `None` until ingestion completed
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Histogram of the stored payload, `None` until ingestion completed
    pub fn nucleic_counts(&self) -> Option<&NucleicCounts> {
        if self.nucleic_counts.is_empty() {
            None
        } else {
            Some(&self.nucleic_counts)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.length.is_some()
    }

    /// Apply ingestion results. Length and histogram always change together.
    pub fn complete(&mut self, length: u64, counts: NucleicCounts) {
        self.length = Some(length);
        self.nucleic_counts = counts.into_iter().filter(|(_, n)| *n > 0).collect();
    }

    /// Comment recovered from FASTA headers, if any
    pub fn set_fasta_comment(&mut self, comment: String) {
        self.fasta_comment = if comment.is_empty() { None } else { Some(comment) };
    }
}
