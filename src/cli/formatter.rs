/// Terminal output helpers for the seqimport commands
use crate::bio::sequence::SequenceRecord;
use colored::*;
use humansize::{format_size, DECIMAL};

/// Print a success message
pub fn print_success(message: &str) {
    println!("\n{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!(
        "\n{} {}",
        "⚠".yellow(),
        format!("Warning: {}", message).yellow()
    );
}

/// Print a section header
pub fn print_section(title: &str) {
    println!("\n{} {}", "▶".cyan(), title.bold());
    println!("{}", "─".repeat(60).dimmed());
}

/// Payload size for a canonical sequence of `length` bases (one byte each)
pub fn format_payload_size(length: u64) -> String {
    format_size(length, DECIMAL)
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Label/value rows describing a record
pub fn record_rows(record: &SequenceRecord) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("Id", record.id.to_string()),
        ("Name", record.name.clone()),
        ("Type", record.seq_type.to_string()),
        ("Circular", record.circular.to_string()),
        ("Created", record.created.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("Buffer", record.buffer_id.to_string()),
    ];
    match record.length() {
        Some(length) => {
            rows.push(("Length", format!("{} bp", format_number(length))));
            rows.push(("Payload", format_payload_size(length)));
        }
        None => rows.push(("Length", "pending".to_string())),
    }
    if let Some(accession) = &record.ncbi {
        rows.push(("Accession", accession.clone()));
    }
    if let Some(owner) = &record.owner {
        rows.push(("Owner", owner.clone()));
    }
    if !record.tags.is_empty() {
        rows.push((
            "Tags",
            record.tags.iter().cloned().collect::<Vec<_>>().join(", "),
        ));
    }
    rows
}

pub fn print_record(record: &SequenceRecord) {
    print_section(&format!("Sequence {}", record.name));
    for (label, value) in record_rows(record) {
        println!("  {:<10} {}", format!("{}:", label).dimmed(), value);
    }

    if let Some(comment) = &record.fasta_comment {
        println!("  {:<10}", "Comment:".dimmed());
        for line in comment.lines() {
            println!("    {}", line);
        }
    }

    if let Some(counts) = record.nucleic_counts() {
        let total: u64 = counts.values().sum();
        println!("  {}", "Composition:".dimmed());
        for (symbol, count) in counts {
            let share = if total > 0 {
                *count as f64 * 100.0 / total as f64
            } else {
                0.0
            };
            println!(
                "    {} {:>14} {:>6.2}%",
                symbol.to_string().cyan().bold(),
                format_number(*count),
                share
            );
        }
    }
}
