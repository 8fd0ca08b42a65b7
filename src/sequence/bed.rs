//! BED-style coordinate tables.

use super::{reverse_complement, SequenceRecord};
use crate::error::{IndexError, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// One interval: 0-based, half-open `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BedRecord {
    pub seq_name: String,
    pub start: usize,
    pub end: usize,
    pub name: String,
    pub score: f64,
    /// `'+'` or `'-'`.
    pub strand: char,
}

impl BedRecord {
    /// Label used as origin name of the extracted sub-sequence.
    pub fn origin(&self) -> String {
        format!("{}:{}-{}({})", self.seq_name, self.start, self.end, self.strand)
    }
}

/// Intervals keyed by sequence name, in file order.
#[derive(Debug, Clone, Default)]
pub struct BedTable {
    entries: HashMap<String, Vec<BedRecord>>,
    len: usize,
}

impl BedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = text.len(), "read BED file");
        Self::parse(&text)
    }

    /// Parse tab/space separated BED text (3 to 6 columns).
    pub fn parse(text: &str) -> Result<Self> {
        let mut table = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty()
                || line.starts_with('#')
                || line.starts_with("track")
                || line.starts_with("browser")
            {
                continue;
            }
            table.push(parse_line(line, lineno + 1)?);
        }
        Ok(table)
    }

    pub fn push(&mut self, record: BedRecord) {
        self.entries
            .entry(record.seq_name.clone())
            .or_default()
            .push(record);
        self.len += 1;
    }

    pub fn get(&self, seq_name: &str) -> &[BedRecord] {
        self.entries.get(seq_name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sub-sequences of `record` covered by its intervals; `-` strand
    /// intervals are reverse-complemented.
    pub fn extract(&self, record: &SequenceRecord) -> Result<Vec<(BedRecord, Vec<u8>)>> {
        let mut out = Vec::new();
        for bed in self.get(&record.name) {
            if bed.start >= record.seq.len() {
                return Err(IndexError::input(format!(
                    "interval {} starts beyond sequence length {}",
                    bed.origin(),
                    record.seq.len()
                )));
            }
            let end = bed.end.min(record.seq.len());
            let slice = &record.seq[bed.start..end];
            let text = if bed.strand == '-' {
                reverse_complement(slice)
            } else {
                slice.to_vec()
            };
            out.push((bed.clone(), text));
        }
        Ok(out)
    }
}

fn parse_line(line: &str, lineno: usize) -> Result<BedRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(IndexError::input(format!(
            "BED line {lineno}: expected at least 3 columns, got {}",
            fields.len()
        )));
    }
    let coord = |s: &str| {
        s.parse::<usize>()
            .map_err(|_| IndexError::input(format!("BED line {lineno}: bad coordinate {s:?}")))
    };
    let start = coord(fields[1])?;
    let end = coord(fields[2])?;
    if start >= end {
        return Err(IndexError::input(format!(
            "BED line {lineno}: empty interval {start}-{end}"
        )));
    }
    let seq_name = fields[0].to_string();
    let name = fields
        .get(3)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("{seq_name}:{start}-{end}"));
    let score = match fields.get(4) {
        Some(s) => s
            .parse::<f64>()
            .map_err(|_| IndexError::input(format!("BED line {lineno}: bad score {s:?}")))?,
        None => 0.0,
    };
    let strand = match fields.get(5).copied() {
        None | Some("+") | Some(".") => '+',
        Some("-") => '-',
        Some(other) => {
            return Err(IndexError::input(format!(
                "BED line {lineno}: bad strand {other:?}"
            )))
        }
    };
    Ok(BedRecord {
        seq_name,
        start,
        end,
        name,
        score,
        strand,
    })
}
