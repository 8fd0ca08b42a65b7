//! FASTA/FASTQ record iteration on top of `needletail`.

use super::SequenceRecord;
use crate::error::{IndexError, Result};
use needletail::errors::{ParseError, ParseErrorKind};
use needletail::{parse_fastx_reader, FastxReader};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Iterator over normalized, non-empty records.
///
/// The record name is the first whitespace-delimited word of the header.
pub struct FastaReader<'a> {
    inner: Box<dyn FastxReader + 'a>,
    label: String,
}

impl<'a> FastaReader<'a> {
    /// Parse from any reader. Compressed input is detected by needletail.
    pub fn new<R: Read + Send + 'a>(reader: R) -> Result<Self> {
        let inner = parse_fastx_reader(reader).map_err(|e| parse_error("<stream>", e))?;
        Ok(Self {
            inner,
            label: "<stream>".to_string(),
        })
    }
}

impl FastaReader<'static> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = File::open(path)?;
        let inner = parse_fastx_reader(file).map_err(|e| parse_error(&label, e))?;
        Ok(Self { inner, label })
    }
}

impl Iterator for FastaReader<'_> {
    type Item = Result<SequenceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.inner.next()? {
            Ok(rec) => {
                let name = String::from_utf8_lossy(rec.id())
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_string();
                check_record(SequenceRecord::new(name, rec.seq()))
            }
            Err(e) => Err(parse_error(&self.label, e)),
        };
        Some(item)
    }
}

/// Read failures stay I/O errors; everything else is malformed input.
fn parse_error(label: &str, err: ParseError) -> IndexError {
    match err.kind {
        ParseErrorKind::Io => {
            IndexError::Io(io::Error::new(io::ErrorKind::Other, format!("{label}: {err}")))
        }
        _ => IndexError::input(format!("{label}: {err}")),
    }
}

pub(crate) fn check_record(record: SequenceRecord) -> Result<SequenceRecord> {
    if record.name.is_empty() {
        return Err(IndexError::input("record with empty header"));
    }
    if record.seq.is_empty() {
        return Err(IndexError::input(format!(
            "record {} has an empty sequence",
            record.name
        )));
    }
    Ok(record)
}
