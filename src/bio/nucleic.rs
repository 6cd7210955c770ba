//! IUPAC nucleic symbols and Watson-Crick pairing

use crate::processing::normalizer::to_canonical_byte;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceType {
    DNA,
    RNA,
}

impl Default for SequenceType {
    fn default() -> Self {
        Self::DNA
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DNA => write!(f, "DNA"),
            Self::RNA => write!(f, "RNA"),
        }
    }
}

impl std::str::FromStr for SequenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dna" => Ok(Self::DNA),
            "rna" => Ok(Self::RNA),
            _ => Err(format!("Unknown sequence type: {}", s)),
        }
    }
}

/// One IUPAC nucleic code, or `NONE` for anything that is not one.
///
/// Declaration order is stable and used as the counter index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Nucleic {
    A,
    B,
    C,
    D,
    G,
    H,
    K,
    M,
    N,
    R,
    S,
    T,
    U,
    V,
    W,
    Y,
    NONE,
}

/// Number of `Nucleic` values including `NONE`
pub const NUCLEIC_COUNT: usize = 17;

const ASCII_NULL: u8 = 0;

// Indexed by canonical byte. Everything not listed maps to NONE.
static INTERNAL_TABLE: [Nucleic; 256] = build_internal_table();

const fn build_internal_table() -> [Nucleic; 256] {
    let mut table = [Nucleic::NONE; 256];
    let mut i = 0;
    while i < Nucleic::SYMBOLS.len() {
        let symbol = Nucleic::SYMBOLS[i];
        table[symbol.to_byte() as usize] = symbol;
        i += 1;
    }
    table
}

impl Nucleic {
    /// The sixteen real symbols, in index order
    pub const SYMBOLS: [Nucleic; 16] = [
        Nucleic::A,
        Nucleic::B,
        Nucleic::C,
        Nucleic::D,
        Nucleic::G,
        Nucleic::H,
        Nucleic::K,
        Nucleic::M,
        Nucleic::N,
        Nucleic::R,
        Nucleic::S,
        Nucleic::T,
        Nucleic::U,
        Nucleic::V,
        Nucleic::W,
        Nucleic::Y,
    ];

    /// Raw byte of the symbol in the canonical format (0 for NONE)
    pub const fn to_byte(self) -> u8 {
        match self {
            Nucleic::A => b'A',
            Nucleic::B => b'B',
            Nucleic::C => b'C',
            Nucleic::D => b'D',
            Nucleic::G => b'G',
            Nucleic::H => b'H',
            Nucleic::K => b'K',
            Nucleic::M => b'M',
            Nucleic::N => b'N',
            Nucleic::R => b'R',
            Nucleic::S => b'S',
            Nucleic::T => b'T',
            Nucleic::U => b'U',
            Nucleic::V => b'V',
            Nucleic::W => b'W',
            Nucleic::Y => b'Y',
            Nucleic::NONE => ASCII_NULL,
        }
    }

    const fn dna_partner(self) -> u8 {
        match self {
            Nucleic::A => b'T',
            Nucleic::T => b'A',
            Nucleic::C => b'G',
            Nucleic::G => b'C',
            _ => ASCII_NULL,
        }
    }

    const fn rna_partner(self) -> u8 {
        match self {
            Nucleic::A => b'U',
            Nucleic::U => b'A',
            Nucleic::C => b'G',
            Nucleic::G => b'C',
            _ => ASCII_NULL,
        }
    }

    /// Position used for per-symbol counters
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lookup for raw input in any case. Unknown bytes give `NONE`.
    #[inline]
    pub fn from_byte(b: u8) -> Nucleic {
        Self::from_internal(to_canonical_byte(b))
    }

    /// Fast lookup for bytes already in the canonical (uppercased) format
    #[inline]
    pub fn from_internal(b: u8) -> Nucleic {
        INTERNAL_TABLE[b as usize]
    }

    /// Lookup for a general char; anything outside ASCII is `NONE`
    pub fn from_char(c: char) -> Nucleic {
        if c.is_ascii() {
            Self::from_byte(c as u8)
        } else {
            Nucleic::NONE
        }
    }

    /// True if the canonical byte is not a nucleic symbol
    #[inline]
    pub fn is_not_nucleic_internal(b: u8) -> bool {
        Self::from_internal(b) == Nucleic::NONE
    }

    /// Watson-Crick partner, or `NONE` when no pairing is defined.
    ///
    /// Only the unambiguous bases pair: A-T (DNA), A-U (RNA) and C-G.
    pub fn complement(self, seq_type: SequenceType) -> Nucleic {
        let partner = match seq_type {
            SequenceType::DNA => self.dna_partner(),
            SequenceType::RNA => self.rna_partner(),
        };
        Self::from_internal(partner)
    }

    pub fn is_complement_of(self, other: Nucleic, seq_type: SequenceType) -> bool {
        self != Nucleic::NONE
            && self.complement(seq_type) == other
            && other.complement(seq_type) == self
    }
}

impl fmt::Display for Nucleic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nucleic::NONE => write!(f, "NONE"),
            other => write!(f, "{}", other.to_byte() as char),
        }
    }
}
