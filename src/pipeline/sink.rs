//! What the finisher does with signed chunks.

use super::Chunk;
use crate::error::{IndexError, Result};
use crate::index::{CategoryTable, Histogram, HistogramIndex, IndexSink};
use std::collections::HashMap;
use tracing::debug;

/// Ids a sink already holds when a run starts.
#[derive(Debug, Clone, Default)]
pub struct KnownIds {
    pub labels: CategoryTable,
    /// Highest id in use, labeled or not.
    pub last_id: u32,
}

/// Finisher-side strategy, called from a single thread.
pub trait ChunkSink {
    /// Whether commits read [`Instance::group`](super::Instance::group).
    /// When `false` the reader leaves every group at 0.
    fn uses_groups(&self) -> bool {
        true
    }

    /// Ids the reader must continue numbering after.
    fn known_ids(&self) -> KnownIds {
        KnownIds::default()
    }

    /// A group id was handed out for a label for the first time.
    fn register_label(&mut self, id: u32, name: &str) -> Result<()> {
        let _ = (id, name);
        Ok(())
    }

    /// Consume one chunk of signed instances.
    fn commit(&mut self, chunk: &Chunk) -> Result<()>;

    /// Called once after the last chunk of a successful run.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Inserts every instance into an index under its group id.
#[derive(Debug)]
pub struct Indexer<I> {
    index: I,
}

impl<I: IndexSink> Indexer<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn into_inner(self) -> I {
        self.index
    }
}

impl<I: IndexSink> ChunkSink for Indexer<I> {
    fn known_ids(&self) -> KnownIds {
        KnownIds {
            labels: self.index.labels().cloned().unwrap_or_default(),
            last_id: self.index.last_id(),
        }
    }

    fn register_label(&mut self, id: u32, name: &str) -> Result<()> {
        self.index.register_label(id, name)
    }

    fn commit(&mut self, chunk: &Chunk) -> Result<()> {
        for inst in chunk.instances() {
            self.index.update(&inst.signature, inst.group)?;
        }
        Ok(())
    }
}

/// Summed evidence for one input sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub origin: u32,
    pub name: String,
    pub histogram: Histogram,
    pub windows: u32,
}

impl Classification {
    /// Top category and its score; ties go to the lower id.
    pub fn best(&self) -> Option<(u32, u32)> {
        self.histogram.best()
    }

    /// Name of the top category in `index`.
    pub fn best_label<'i>(&self, index: &'i HistogramIndex) -> Option<&'i str> {
        let (id, _) = self.best()?;
        index.categories().name(id)
    }
}

#[derive(Debug, Default)]
struct Partial {
    histogram: Histogram,
    seen: u32,
    expected: Option<u32>,
}

/// Scores windows against a histogram index and sums them per origin.
///
/// Windows are grouped by origin id, not by arrival order: an origin is
/// complete once its last window has been seen and the count matches.
pub struct Classifier<'a> {
    index: &'a HistogramIndex,
    names: HashMap<u32, String>,
    pending: HashMap<u32, Partial>,
    done: Vec<Classification>,
}

impl<'a> Classifier<'a> {
    pub fn new(index: &'a HistogramIndex) -> Self {
        Self {
            index,
            names: HashMap::new(),
            pending: HashMap::new(),
            done: Vec::new(),
        }
    }

    /// Completed origins; sorted by origin id after a successful run.
    pub fn results(&self) -> &[Classification] {
        &self.done
    }

    pub fn into_results(self) -> Vec<Classification> {
        self.done
    }

    fn complete(&mut self, origin: u32) {
        let Some(partial) = self.pending.remove(&origin) else {
            return;
        };
        let name = self.names.remove(&origin).unwrap_or_default();
        debug!(origin, name = %name, windows = partial.seen, "classified");
        self.done.push(Classification {
            origin,
            name,
            histogram: partial.histogram,
            windows: partial.seen,
        });
    }
}

impl ChunkSink for Classifier<'_> {
    fn uses_groups(&self) -> bool {
        false
    }

    fn commit(&mut self, chunk: &Chunk) -> Result<()> {
        for (origin, name) in chunk.origins() {
            self.names.insert(*origin, name.clone());
        }
        for inst in chunk.instances() {
            let hist = self.index.compute_histogram(&inst.signature);
            let partial = self.pending.entry(inst.origin).or_default();
            partial.histogram.accumulate(&hist);
            partial.seen += 1;
            if inst.is_last {
                partial.expected = Some(inst.fragment + 1);
            }
            if partial.expected == Some(partial.seen) {
                self.complete(inst.origin);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            return Err(IndexError::Pipeline(format!(
                "{} sequences ended without all of their windows",
                self.pending.len()
            )));
        }
        self.done.sort_by_key(|c| c.origin);
        Ok(())
    }
}
