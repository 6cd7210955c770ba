pub mod importer;

pub use importer::SequenceImporter;
