//! Case normalization and cleaning of raw sequence lines into canonical buffers.
//!
//! Input is ASCII or UTF-8. Uppercasing clears bit 5 of every byte while the
//! high bit is kept, so bytes of multi-byte UTF-8 sequences never turn into
//! ASCII letters. Anything that is not a nucleic symbol after masking is
//! dropped by [`trim`].

use crate::bio::nucleic::Nucleic;
use crate::error::{ImportError, ImportResult};
use crate::utils::parallel::WorkerPool;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::io::{self, BufRead};

/// 0b1101_1111: clears the lowercase bit, keeps the UTF-8 high bit
pub const CASE_MASK: u8 = 0x5F | 0x80;

const WORD_MASK_64: u64 = u64::from_ne_bytes([CASE_MASK; 8]);
const WORD_MASK_32: u32 = u32::from_ne_bytes([CASE_MASK; 4]);
const WORD_MASK_16: u16 = u16::from_ne_bytes([CASE_MASK; 2]);

/// Separator used in staged files between joined FASTA header lines
pub const HEADER_JOINER: char = '\0';

/// Normalize one byte to the canonical (uppercase) format
#[inline]
pub const fn to_canonical_byte(b: u8) -> u8 {
    b & CASE_MASK
}

/// Uppercase a buffer in place, eight bytes at a time, then 4/2/1 for the tail.
/// Length is preserved and the operation is idempotent.
pub fn normalize_buffer(buffer: &mut [u8]) {
    let mut words = buffer.chunks_exact_mut(8);
    for word in &mut words {
        let value = u64::from_ne_bytes([
            word[0], word[1], word[2], word[3], word[4], word[5], word[6], word[7],
        ]) & WORD_MASK_64;
        word.copy_from_slice(&value.to_ne_bytes());
    }

    let mut tail = words.into_remainder();
    if tail.len() >= 4 {
        let (head, rest) = tail.split_at_mut(4);
        let value = u32::from_ne_bytes([head[0], head[1], head[2], head[3]]) & WORD_MASK_32;
        head.copy_from_slice(&value.to_ne_bytes());
        tail = rest;
    }
    if tail.len() >= 2 {
        let (head, rest) = tail.split_at_mut(2);
        let value = u16::from_ne_bytes([head[0], head[1]]) & WORD_MASK_16;
        head.copy_from_slice(&value.to_ne_bytes());
        tail = rest;
    }
    if let Some(last) = tail.first_mut() {
        *last = to_canonical_byte(*last);
    }
}

/// Remove bytes that are not canonical nucleic symbols.
///
/// A clean buffer is returned as is, without copying. Otherwise a new buffer
/// with the valid bytes in their original order is built.
pub fn trim(buffer: Vec<u8>) -> Vec<u8> {
    let first_dirty = match buffer.iter().position(|&b| Nucleic::is_not_nucleic_internal(b)) {
        Some(pos) => pos,
        None => return buffer,
    };

    let mut clean = Vec::with_capacity(buffer.len() - 1);
    clean.extend_from_slice(&buffer[..first_dirty]);
    clean.extend(
        buffer[first_dirty + 1..]
            .iter()
            .copied()
            .filter(|&b| !Nucleic::is_not_nucleic_internal(b)),
    );
    clean
}

/// Normalize and trim one raw line
pub fn clean_line(line: String) -> Vec<u8> {
    let mut bytes = line.into_bytes();
    normalize_buffer(&mut bytes);
    trim(bytes)
}

/// Decode one raw line without failing on invalid UTF-8.
///
/// Invalid sequences become U+FFFD, whose bytes all carry the high bit and
/// are dropped by [`trim`]. A trailing `\r` is removed.
pub fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Lines of `reader` split on `\n` and decoded with [`decode_line`]
pub fn read_lines_lossy<R: BufRead>(reader: R) -> impl Iterator<Item = io::Result<String>> {
    reader.split(b'\n').map(|line| line.map(decode_line))
}

/// Lazily turn raw lines into canonical buffers, one per line.
///
/// Lines that are empty before or after cleaning produce nothing.
pub fn split_lines<I>(lines: I) -> impl Iterator<Item = ImportResult<Vec<u8>>>
where
    I: Iterator<Item = ImportResult<String>>,
{
    lines.filter_map(|line| match line {
        Ok(line) if line.is_empty() => None,
        Ok(line) => {
            let clean = clean_line(line);
            if clean.is_empty() {
                None
            } else {
                Some(Ok(clean))
            }
        }
        Err(e) => Some(Err(e)),
    })
}

/// Same as [`split_lines`] but with FASTA header lines routed to `comment`.
pub fn split_fasta<'a, I>(
    lines: I,
    comment: &'a mut String,
) -> impl Iterator<Item = ImportResult<Vec<u8>>> + 'a
where
    I: Iterator<Item = ImportResult<String>> + 'a,
{
    split_lines(FastaLines::new(lines, comment))
}

pub fn is_fasta_header(line: &str) -> bool {
    line.starts_with('>') || line.starts_with(';')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    NotSeen,
    InHeader,
    Closed,
    Failed,
}

/// Filters FASTA header lines out of a line stream into a comment sink.
///
/// Headers are appended newline-joined; staged header blocks carrying
/// [`HEADER_JOINER`] are split back into lines. A header block that starts
/// after a previous block was closed by sequence data is a multi-record input
/// and ends iteration with a format violation. Blank lines neither open nor
/// close a header block.
pub struct FastaLines<'a, I> {
    inner: I,
    comment: &'a mut String,
    state: HeaderState,
}

impl<'a, I> FastaLines<'a, I>
where
    I: Iterator<Item = ImportResult<String>>,
{
    pub fn new(inner: I, comment: &'a mut String) -> Self {
        Self {
            inner,
            comment,
            state: HeaderState::NotSeen,
        }
    }

    fn append_comment(&mut self, header: &str) {
        for part in header.split(HEADER_JOINER) {
            if !self.comment.is_empty() {
                self.comment.push('\n');
            }
            self.comment.push_str(part);
        }
    }
}

impl<I> Iterator for FastaLines<'_, I>
where
    I: Iterator<Item = ImportResult<String>>,
{
    type Item = ImportResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == HeaderState::Failed {
            return None;
        }
        loop {
            let line = match self.inner.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.state = HeaderState::Failed;
                    return Some(Err(e));
                }
            };

            if is_fasta_header(&line) {
                if self.state == HeaderState::Closed {
                    self.state = HeaderState::Failed;
                    return Some(Err(ImportError::FormatViolation(
                        "Multi-FASTA input is not supported: found a second header block"
                            .to_string(),
                    )));
                }
                self.state = HeaderState::InHeader;
                self.append_comment(&line);
                continue;
            }

            if !line.is_empty() && self.state == HeaderState::InHeader {
                self.state = HeaderState::Closed;
            }
            return Some(Ok(line));
        }
    }
}

/// Cleans lines on the worker pool a window at a time, yielding in input order.
///
/// Pulling from the source stays on the consuming thread, so stateful
/// adapters such as [`FastaLines`] see lines strictly in order.
pub struct ParallelCleaner<'p, I> {
    inner: I,
    pool: &'p WorkerPool,
    window: usize,
    ready: VecDeque<Vec<u8>>,
    deferred_err: Option<ImportError>,
    exhausted: bool,
}

impl<'p, I> ParallelCleaner<'p, I>
where
    I: Iterator<Item = ImportResult<String>>,
{
    pub fn new(inner: I, pool: &'p WorkerPool) -> Self {
        let window = pool.current_num_threads().max(1) * 2;
        Self {
            inner,
            pool,
            window,
            ready: VecDeque::with_capacity(window),
            deferred_err: None,
            exhausted: false,
        }
    }

    fn fill(&mut self) {
        let mut batch = Vec::with_capacity(self.window);
        while batch.len() < self.window {
            match self.inner.next() {
                Some(Ok(line)) if line.is_empty() => {}
                Some(Ok(line)) => batch.push(line),
                Some(Err(e)) => {
                    self.deferred_err = Some(e);
                    self.exhausted = true;
                    break;
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        if batch.is_empty() {
            return;
        }

        let cleaned: Vec<Vec<u8>> = self
            .pool
            .install(|| batch.into_par_iter().map(clean_line).collect());
        self.ready
            .extend(cleaned.into_iter().filter(|buffer| !buffer.is_empty()));
    }
}

impl<I> Iterator for ParallelCleaner<'_, I>
where
    I: Iterator<Item = ImportResult<String>>,
{
    type Item = ImportResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(buffer) = self.ready.pop_front() {
                return Some(Ok(buffer));
            }
            if self.exhausted {
                return self.deferred_err.take().map(Err);
            }
            self.fill();
        }
    }
}
