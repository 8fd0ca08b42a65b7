//! LSH inverse indexes over MinHash signatures.
//!
//! Both indexes keep one hash map per signature slot, from slot value to the
//! set of ids inserted under that value:
//!
//! - [`NeighborhoodIndex`]: ids are instances; queries return ranked
//!   approximate neighbors (clustering).
//! - [`HistogramIndex`]: ids are categories; queries return per-category
//!   vote counts (classification), and the index can be snapshotted.
//!
//! Bins are capped at `max_size_bin`. A bin that would exceed the cap is
//! poisoned: its ids are discarded and it only reports that the key is too
//! common to be informative.

mod bin;
mod categories;
pub mod histogram;
pub mod neighborhood;

pub use bin::{Bin, SortedBin};
pub use categories::CategoryTable;
pub use histogram::{Histogram, HistogramIndex, HistogramSummary};
pub use neighborhood::{Neighbor, Neighborhood, NeighborhoodIndex, NeighborhoodStats};

use crate::error::Result;
use crate::hash::Signature;

/// An index the pipeline can feed signatures into.
pub trait IndexSink {
    /// Insert `signature` under `id`.
    fn update(&mut self, signature: &Signature, id: u32) -> Result<()>;

    /// Bind a human-readable label to `id`. Ignored by default.
    fn register_label(&mut self, id: u32, name: &str) -> Result<()> {
        let _ = (id, name);
        Ok(())
    }

    /// Labels bound so far, for indexes that keep them.
    fn labels(&self) -> Option<&CategoryTable> {
        None
    }

    /// Highest id inserted or registered so far; 0 when empty.
    fn last_id(&self) -> u32 {
        0
    }
}
