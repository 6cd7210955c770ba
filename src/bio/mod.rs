pub mod nucleic;
pub mod sequence;

pub use nucleic::{Nucleic, SequenceType, NUCLEIC_COUNT};
pub use sequence::{NucleicCounts, SequenceRecord};
