//! Sequence input: records, windows and coordinate tables.
//!
//! The pipeline only needs a [`SequenceSource`]: something that hands out
//! windows one at a time, with all windows of one origin delivered
//! contiguously and the final one flagged. [`WindowSource`] is the stock
//! implementation over FASTA files or in-memory records.

mod bed;
mod fasta;
mod window;

pub use bed::{BedRecord, BedTable};
pub use fasta::FastaReader;
pub use window::WindowSource;

use crate::error::Result;

/// One named sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub name: String,
    pub seq: Vec<u8>,
}

impl SequenceRecord {
    pub fn new(name: impl Into<String>, seq: impl AsRef<[u8]>) -> Self {
        Self {
            name: name.into(),
            seq: normalize(seq.as_ref()),
        }
    }
}

/// Strand a window was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrandKind {
    Forward,
    Reverse,
}

/// A window of sequence ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub text: Vec<u8>,
    /// Name of the sequence (or interval) this window came from.
    pub origin: String,
    /// Offset of the window on its strand.
    pub start: usize,
    pub strand: StrandKind,
    /// Last window of `origin`.
    pub is_last: bool,
    /// External feature label, when windows come from a coordinate table.
    pub feature: Option<String>,
}

/// Producer of sequence windows for the reader stage.
pub trait SequenceSource {
    /// Next window, or `None` once every input is exhausted.
    fn next_window(&mut self) -> Result<Option<Window>>;

    /// Input files fully consumed so far.
    fn files_done(&self) -> u64 {
        0
    }
}

/// Upper-case and drop whitespace.
pub fn normalize(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .filter(|b| !b.is_ascii_whitespace())
        .map(|b| b.to_ascii_uppercase())
        .collect()
}

/// Reverse complement; unknown symbols become `N`.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&nuc| match nuc.to_ascii_uppercase() {
            b'A' => b'T',
            b'T' | b'U' => b'A',
            b'C' => b'G',
            b'G' => b'C',
            _ => b'N',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_complement_basic() {
        assert_eq!(reverse_complement(b"ACGTN"), b"NACGT");
        assert_eq!(reverse_complement(b"acgu"), b"ACGT");
        assert_eq!(reverse_complement(b"AXG"), b"CNT");
    }

    #[test]
    fn double_reverse_complement_is_identity() {
        let seq = b"ACGTTGCAAGGCT";
        assert_eq!(reverse_complement(&reverse_complement(seq)), seq);
    }

    #[test]
    fn record_is_normalized() {
        let rec = SequenceRecord::new("x", "acg t\nNN");
        assert_eq!(rec.seq, b"ACGTNN");
    }
}
