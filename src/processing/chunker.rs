//! Re-chunking of raw input into staged lines of cache-friendly size.
//!
//! Source lines are concatenated until the next one would push the current
//! output line past `max_line_length`; source lines are never split. In FASTA
//! mode consecutive header lines are joined with [`HEADER_JOINER`] onto one
//! staged line so that the comment can be recovered line by line later.

use crate::error::{ImportError, ImportResult};
use crate::processing::normalizer::{is_fasta_header, HEADER_JOINER};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Layout of raw (not yet canonical) sequence data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawFormat {
    Fasta,
    Plain,
}

impl RawFormat {
    pub fn suffix(self) -> &'static str {
        match self {
            RawFormat::Fasta => "fasta",
            RawFormat::Plain => "txt",
        }
    }
}

impl std::str::FromStr for RawFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fasta" | "fa" | "fna" => Ok(RawFormat::Fasta),
            "plain" | "txt" | "raw" => Ok(RawFormat::Plain),
            _ => Err(format!("Unknown raw format: {}", s)),
        }
    }
}

pub struct ChunkPreprocessor {
    max_line_length: usize,
}

#[derive(Default)]
struct ChunkState {
    /// Bytes of sequence data on the current output line
    current_length: usize,
    /// Something has been written to the current output line
    line_open: bool,
    in_header: bool,
    header_closed: bool,
}

impl ChunkPreprocessor {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length: max_line_length.max(1),
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Rewrite `lines` into `out`. Returns the number of staged lines written.
    ///
    /// Write failures are reported as storage errors; errors from `lines`
    /// are passed through unchanged.
    pub fn process<W, I>(&self, format: RawFormat, lines: I, out: &mut W) -> ImportResult<usize>
    where
        W: Write,
        I: IntoIterator<Item = ImportResult<String>>,
    {
        let mut state = ChunkState::default();
        let mut staged_lines = 0usize;

        for line in lines {
            let line = line?;
            if format == RawFormat::Fasta && is_fasta_header(&line) {
                self.push_header(&mut state, &line, out, &mut staged_lines)?;
            } else if !line.is_empty() {
                self.push_data(&mut state, &line, out, &mut staged_lines)?;
            }
        }

        if state.line_open {
            write_bytes(out, b"\n")?;
            staged_lines += 1;
        }
        out.flush()
            .map_err(|e| ImportError::storage("flushing staged data", e))?;
        Ok(staged_lines)
    }

    fn push_header<W: Write>(
        &self,
        state: &mut ChunkState,
        line: &str,
        out: &mut W,
        staged_lines: &mut usize,
    ) -> ImportResult<()> {
        if state.header_closed {
            return Err(ImportError::FormatViolation(
                "Multi-FASTA input is not supported: found a second header block".to_string(),
            ));
        }

        if state.in_header {
            let mut joiner = [0u8; 4];
            write_bytes(out, HEADER_JOINER.encode_utf8(&mut joiner).as_bytes())?;
        } else if state.line_open {
            write_bytes(out, b"\n")?;
            *staged_lines += 1;
        }
        write_bytes(out, line.as_bytes())?;

        state.in_header = true;
        state.line_open = true;
        state.current_length = 0;
        Ok(())
    }

    fn push_data<W: Write>(
        &self,
        state: &mut ChunkState,
        line: &str,
        out: &mut W,
        staged_lines: &mut usize,
    ) -> ImportResult<()> {
        if state.in_header {
            write_bytes(out, b"\n")?;
            *staged_lines += 1;
            state.in_header = false;
            state.header_closed = true;
            state.line_open = false;
        } else if state.line_open && state.current_length + line.len() > self.max_line_length {
            write_bytes(out, b"\n")?;
            *staged_lines += 1;
            state.current_length = 0;
            state.line_open = false;
        }

        write_bytes(out, line.as_bytes())?;
        state.current_length += line.len();
        state.line_open = true;
        Ok(())
    }
}

fn write_bytes<W: Write>(out: &mut W, bytes: &[u8]) -> ImportResult<()> {
    out.write_all(bytes)
        .map_err(|e| ImportError::storage("writing staged data", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(format: RawFormat, max: usize, input: &str) -> ImportResult<String> {
        let mut out = Vec::new();
        ChunkPreprocessor::new(max).process(
            format,
            input.lines().map(|l| Ok(l.to_string())),
            &mut out,
        )?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_plain_lines_are_merged_up_to_target() {
        let staged = run(RawFormat::Plain, 8, "ACGT\nACGT\nACGT\nAC\n").unwrap();
        assert_eq!(staged, "ACGTACGT\nACGTAC\n");
    }

    #[test]
    fn test_plain_long_line_is_not_split() {
        let staged = run(RawFormat::Plain, 4, "AC\nACGTACGTAC\nGG\n").unwrap();
        assert_eq!(staged, "AC\nACGTACGTAC\nGG\n");
    }

    #[test]
    fn test_fasta_header_on_own_line() {
        let staged = run(RawFormat::Fasta, 100, ">seq1\nACGTacgtNNNxyz\n").unwrap();
        assert_eq!(staged, ">seq1\nACGTacgtNNNxyz\n");
    }

    #[test]
    fn test_fasta_consecutive_headers_joined() {
        let staged = run(RawFormat::Fasta, 100, ">id one\n;comment\nAC\nGT\n").unwrap();
        assert_eq!(staged, ">id one\0;comment\nACGT\n");
    }

    #[test]
    fn test_fasta_header_resets_chunk_length() {
        let staged = run(RawFormat::Fasta, 4, "AC\n>h\nACGT\nA\n").unwrap();
        assert_eq!(staged, "AC\n>h\nACGT\nA\n");
    }

    #[test]
    fn test_fasta_second_header_block_rejected() {
        let err = run(RawFormat::Fasta, 100, ">a\nACGT\n>b\nTTTT\n").unwrap_err();
        assert!(matches!(err, ImportError::FormatViolation(_)));
    }

    #[test]
    fn test_plain_mode_ignores_header_syntax() {
        let staged = run(RawFormat::Plain, 100, ">a\nAC\n>b\n").unwrap();
        assert_eq!(staged, ">aAC>b\n");
    }

    #[test]
    fn test_input_error_passes_through() {
        let mut out = Vec::new();
        let lines = vec![
            Ok("ACGT".to_string()),
            Err(ImportError::transport("connection reset")),
        ];
        let err = ChunkPreprocessor::new(10)
            .process(RawFormat::Plain, lines, &mut out)
            .unwrap_err();
        assert!(matches!(err, ImportError::Transport { .. }));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("FASTA".parse::<RawFormat>().unwrap(), RawFormat::Fasta);
        assert_eq!("txt".parse::<RawFormat>().unwrap(), RawFormat::Plain);
        assert!("bam".parse::<RawFormat>().is_err());
    }
}
