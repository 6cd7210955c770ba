// Raw data processing: re-chunking, normalization and counting

pub mod chunker;
pub mod counter;
pub mod normalizer;

pub use chunker::{ChunkPreprocessor, RawFormat};
pub use counter::NucleicCounter;
pub use normalizer::{normalize_buffer, split_fasta, split_lines, trim, FastaLines, ParallelCleaner};
