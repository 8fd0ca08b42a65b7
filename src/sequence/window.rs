//! Sliding windows over FASTA files or in-memory records.

use super::fasta::{check_record, FastaReader};
use super::{reverse_complement, BedTable, SequenceRecord, SequenceSource, StrandKind, Window};
use crate::config::{Params, Strand};
use crate::error::{IndexError, Result};
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::debug;

enum Input {
    Records(VecDeque<SequenceRecord>),
    Files {
        paths: VecDeque<PathBuf>,
        current: Option<(PathBuf, FastaReader<'static>)>,
    },
}

/// Window/shift/strand policy applied to a stream of records.
///
/// Every window of one origin is queued before the first is handed out, so
/// fragments of a sequence always leave this source back to back.
pub struct WindowSource {
    input: Input,
    window: usize,
    shift: usize,
    strand: Strand,
    bed: Option<BedTable>,
    pending: VecDeque<Window>,
    files_done: u64,
}

impl WindowSource {
    pub fn from_records(records: Vec<SequenceRecord>, params: &Params) -> Self {
        Self::with_input(Input::Records(records.into()), params)
    }

    /// Read FASTA files in order. Missing files fail here, before any work.
    pub fn from_files(paths: Vec<PathBuf>, params: &Params) -> Result<Self> {
        if paths.is_empty() {
            return Err(IndexError::config("no input files given"));
        }
        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(IndexError::config(format!(
                "input file {} does not exist",
                missing.display()
            )));
        }
        Ok(Self::with_input(
            Input::Files {
                paths: paths.into(),
                current: None,
            },
            params,
        ))
    }

    fn with_input(input: Input, params: &Params) -> Self {
        Self {
            input,
            window: params.seq_window as usize,
            shift: params.effective_shift(),
            strand: params.strand,
            bed: None,
            pending: VecDeque::new(),
            files_done: 0,
        }
    }

    /// Sign only the intervals of `table`, labeled with their BED names.
    pub fn with_bed(mut self, table: BedTable) -> Self {
        self.bed = Some(table);
        self
    }

    fn next_record(&mut self) -> Result<Option<SequenceRecord>> {
        match &mut self.input {
            Input::Records(records) => match records.pop_front() {
                Some(rec) => check_record(rec).map(Some),
                None => Ok(None),
            },
            Input::Files { paths, current } => loop {
                if current.is_none() {
                    let Some(path) = paths.pop_front() else {
                        return Ok(None);
                    };
                    let reader = FastaReader::open(&path)?;
                    debug!(file = %path.display(), "opened input");
                    *current = Some((path, reader));
                }
                let Some((path, reader)) = current.as_mut() else {
                    continue;
                };
                match reader.next() {
                    Some(record) => return record.map(Some),
                    None => {
                        debug!(file = %path.display(), "input exhausted");
                        *current = None;
                        self.files_done += 1;
                    }
                }
            },
        }
    }

    fn enqueue(&mut self, record: SequenceRecord) -> Result<()> {
        match &self.bed {
            Some(table) => {
                for (bed, text) in table.extract(&record)? {
                    let origin = bed.origin();
                    self.push_origin(vec![(StrandKind::Forward, text)], origin, Some(bed.name));
                }
            }
            None => {
                let strands = match self.strand {
                    Strand::Forward => vec![(StrandKind::Forward, record.seq)],
                    Strand::Reverse => vec![(StrandKind::Reverse, reverse_complement(&record.seq))],
                    Strand::Both => {
                        let rc = reverse_complement(&record.seq);
                        vec![(StrandKind::Forward, record.seq), (StrandKind::Reverse, rc)]
                    }
                };
                self.push_origin(strands, record.name, None);
            }
        }
        Ok(())
    }

    fn push_origin(
        &mut self,
        strands: Vec<(StrandKind, Vec<u8>)>,
        origin: String,
        feature: Option<String>,
    ) {
        for (strand, seq) in strands {
            for start in window_starts(seq.len(), self.window, self.shift) {
                let end = if self.window == 0 {
                    seq.len()
                } else {
                    (start + self.window).min(seq.len())
                };
                self.pending.push_back(Window {
                    text: seq[start..end].to_vec(),
                    origin: origin.clone(),
                    start,
                    strand,
                    is_last: false,
                    feature: feature.clone(),
                });
            }
        }
        if let Some(last) = self.pending.back_mut() {
            last.is_last = true;
        }
    }
}

impl SequenceSource for WindowSource {
    fn next_window(&mut self) -> Result<Option<Window>> {
        while self.pending.is_empty() {
            match self.next_record()? {
                Some(record) => self.enqueue(record)?,
                None => return Ok(None),
            }
        }
        Ok(self.pending.pop_front())
    }

    fn files_done(&self) -> u64 {
        self.files_done
    }
}

/// Window start offsets; the final window is aligned to the sequence end.
pub(crate) fn window_starts(len: usize, window: usize, shift: usize) -> Vec<usize> {
    if window == 0 || len <= window {
        return vec![0];
    }
    let shift = shift.max(1);
    let mut starts: Vec<usize> = (0..=len - window).step_by(shift).collect();
    if starts.last().is_some_and(|&s| s + window < len) {
        starts.push(len - window);
    }
    starts
}
