pub mod metadata;
pub mod sequence_data;

pub use metadata::{InMemoryMetadataStore, JsonMetadataStore, MetadataStore};
pub use sequence_data::{SequenceDataRepository, SHARED_CPU_CACHE};
