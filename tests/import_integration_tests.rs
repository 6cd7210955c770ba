mod common;

use common::TestEnvironment;
use pretty_assertions::assert_eq;
use seqimport::bio::{Nucleic, NucleicCounts, SequenceRecord, SequenceType};
use seqimport::processing::RawFormat;
use seqimport::storage::{JsonMetadataStore, MetadataStore};
use seqimport::{ImportError, SequenceImporter};
use std::fs::File;
use std::sync::Arc;

#[test]
fn test_single_record_fasta_is_stored_canonically() {
    let env = TestEnvironment::new();
    let (importer, metadata) = env.importer(1024);
    let record = SequenceRecord::new_pending("seq1", SequenceType::DNA);
    let buffer_id = record.buffer_id;

    let saved = importer
        .import_reader(record, RawFormat::Fasta, ">seq1\nACGTacgtNNNxyz\n".as_bytes())
        .unwrap();

    assert_eq!(saved.fasta_comment.as_deref(), Some(">seq1"));
    assert_eq!(importer.data().load(buffer_id).unwrap(), b"ACGTACGTNNNY".to_vec());
    assert_eq!(saved.length(), Some(12));
    assert_eq!(
        saved.nucleic_counts().unwrap(),
        &NucleicCounts::from([
            (Nucleic::A, 2),
            (Nucleic::C, 2),
            (Nucleic::G, 2),
            (Nucleic::T, 2),
            (Nucleic::N, 3),
            (Nucleic::Y, 1),
        ])
    );
    assert_eq!(metadata.find(saved.id).unwrap().unwrap(), saved);
}

#[test]
fn test_unambiguous_fasta_counts() {
    let env = TestEnvironment::new();
    let (importer, _) = env.importer(1024);
    let record = SequenceRecord::new_pending("seq1", SequenceType::DNA);

    let saved = importer
        .import_reader(record, RawFormat::Fasta, ">seq1\nACGTacgtNNxz\n".as_bytes())
        .unwrap();

    assert_eq!(saved.length(), Some(10));
    assert_eq!(
        saved.nucleic_counts().unwrap(),
        &NucleicCounts::from([
            (Nucleic::A, 2),
            (Nucleic::C, 2),
            (Nucleic::G, 2),
            (Nucleic::T, 2),
            (Nucleic::N, 2),
        ])
    );
}

#[test]
fn test_multi_record_fasta_fails_without_leftovers() {
    let env = TestEnvironment::new();
    let (importer, metadata) = env.importer(1024);
    let pending = SequenceRecord::new_pending("two", SequenceType::DNA);
    metadata.save(&pending).unwrap();
    let buffer_id = pending.buffer_id;

    let err = importer
        .import_reader(
            pending.clone(),
            RawFormat::Fasta,
            ">a\nACGT\n>b\nTTTT\n".as_bytes(),
        )
        .unwrap_err();

    assert!(matches!(err, ImportError::FormatViolation(_)));
    assert!(!importer.data().raw_exists(buffer_id, RawFormat::Fasta));
    assert!(!importer.data().payload_exists(buffer_id));

    // Stored record keeps its pre-ingestion state
    let stored = metadata.find(pending.id).unwrap().unwrap();
    assert!(!stored.is_complete());
    assert_eq!(stored.length(), None);
    assert_eq!(stored.nucleic_counts(), None);
}

#[test]
fn test_multi_line_header_is_recovered() {
    let env = TestEnvironment::new();
    let (importer, _) = env.importer(1024);
    let record = SequenceRecord::new_pending("annotated", SequenceType::RNA);

    let saved = importer
        .import_reader(
            record,
            RawFormat::Fasta,
            ">lambda phage\n;complete genome\nACGU\nGGCC\n".as_bytes(),
        )
        .unwrap();

    assert_eq!(
        saved.fasta_comment.as_deref(),
        Some(">lambda phage\n;complete genome")
    );
    assert_eq!(saved.length(), Some(8));
}

#[test]
fn test_payload_matches_cleaned_input_order() {
    let env = TestEnvironment::new();
    // Tiny staged lines force many buffers through the pool
    let (importer, _) = env.importer(16);
    let lines: Vec<String> = (0..500)
        .map(|i| match i % 4 {
            0 => "acgt".to_string(),
            1 => "N-N-N".to_string(),
            2 => "ttttttttttttttttttttttttttttt".to_string(),
            _ => "g c".to_string(),
        })
        .collect();
    let input = lines.join("\n");
    let expected: Vec<u8> = lines
        .iter()
        .flat_map(|line| {
            line.bytes()
                .map(|b| b.to_ascii_uppercase())
                .filter(|&b| Nucleic::from_internal(b) != Nucleic::NONE)
                .collect::<Vec<_>>()
        })
        .collect();

    let record = SequenceRecord::new_pending("ordered", SequenceType::DNA);
    let buffer_id = record.buffer_id;
    let saved = importer
        .import_reader(record, RawFormat::Plain, input.as_bytes())
        .unwrap();

    let payload = importer.data().load(buffer_id).unwrap();
    assert_eq!(payload, expected);
    assert_eq!(saved.length(), Some(expected.len() as u64));

    let counted: u64 = saved.nucleic_counts().unwrap().values().sum();
    assert_eq!(counted, expected.len() as u64);
}

#[test]
fn test_process_already_staged_data() {
    let env = TestEnvironment::new();
    let (importer, _) = env.importer(1024);
    let record = SequenceRecord::new_pending("staged", SequenceType::DNA).with_circular(true);
    let lines = vec![Ok("AC".to_string()), Ok("gt".to_string())];

    importer
        .data()
        .save_raw(record.buffer_id, RawFormat::Plain, lines)
        .unwrap();
    assert!(importer.data().raw_exists(record.buffer_id, RawFormat::Plain));

    let saved = importer.process_staged(record, RawFormat::Plain).unwrap();
    assert!(saved.circular);
    assert_eq!(saved.length(), Some(4));
    assert!(!importer.data().raw_exists(saved.buffer_id, RawFormat::Plain));
}

#[test]
fn test_import_from_config_with_json_records() {
    let env = TestEnvironment::new();
    let config = env.config();
    let input = env.write_input("small.fasta", ">small\nAAAACCCC\nGGGGTTTT\n");

    let store = Arc::new(JsonMetadataStore::new(env.root.join("records")).unwrap());
    let importer = SequenceImporter::from_config(&config, store.clone()).unwrap();
    let record = SequenceRecord::new_pending("small", SequenceType::DNA).with_tag("test");
    store.save(&record).unwrap();

    let saved = importer
        .import_reader(record, RawFormat::Fasta, File::open(input).unwrap())
        .unwrap();

    let reloaded = store.find(saved.id).unwrap().unwrap();
    assert_eq!(reloaded, saved);
    assert_eq!(reloaded.length(), Some(16));
    assert!(reloaded.tags.contains("test"));
    assert_eq!(
        importer.data().load(saved.buffer_id).unwrap(),
        b"AAAACCCCGGGGTTTT".to_vec()
    );
}

#[test]
fn test_missing_payload_is_not_found() {
    let env = TestEnvironment::new();
    let (importer, _) = env.importer(1024);
    let err = importer.data().load(uuid::Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, ImportError::NotFound(_)));
}
