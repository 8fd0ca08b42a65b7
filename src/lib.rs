//! seqlsh: MinHash/LSH similarity indexes over sequence windows.
//!
//! Sequences are cut into windows, each window is reduced to a sparse set of
//! hashed k-mer-pair features, and the feature set is compressed into a
//! fixed-length MinHash signature. Signatures feed one of two inverse
//! indexes:
//!
//! - [`NeighborhoodIndex`]: which indexed instances are probable
//!   near-duplicates of this one (clustering).
//! - [`HistogramIndex`]: how strongly does a window resemble each reference
//!   category (classification), with a flat binary snapshot format.
//!
//! Signing runs in a bounded reader → workers → finisher
//! [`SignaturePipeline`].
//!
//! # Critical Nuances
//!
//! ## Slot agreement estimates Jaccard similarity
//!
//! Each signature slot is an independent min-wise draw, so the fraction of
//! slots on which two signatures agree estimates the Jaccard similarity of
//! their feature sets. With `num_hash_functions = 400` the standard error is
//! about `sqrt(J(1-J)/400)`, i.e. at most 0.025.
//!
//! ## Hot keys
//!
//! Low-complexity sequence (poly-A, microsatellites) produces the same slot
//! values for huge numbers of windows. Bins are capped at `max_size_bin`;
//! a bin that would grow past it is poisoned and only counts as a collision,
//! which keeps query cost bounded by `num_hash_functions * max_size_bin`.
//!
//! ## Reproducibility
//!
//! Every hash is seeded from `random_seed`; ids are assigned in input order
//! by the reader, so the same input and parameters produce the same index
//! (and byte-identical snapshots) for any thread count.
//!
//! # Example
//!
//! ```rust,no_run
//! use seqlsh::{HistogramIndex, Params, SignaturePipeline, WindowSource};
//!
//! # fn main() -> seqlsh::Result<()> {
//! let params = Params::load("params.json")?;
//! let pipeline = SignaturePipeline::new(&params)?;
//!
//! let refs = WindowSource::from_files(vec!["refs.fa".into()], &params)?;
//! let (index, _) = pipeline.index_into(refs, HistogramIndex::new(&params)?)?;
//! index.save("refs.lshx")?;
//!
//! let reads = WindowSource::from_files(vec!["reads.fa".into()], &params)?;
//! let (results, _) = pipeline.classify(reads, &index)?;
//! for c in &results {
//!     println!("{}\t{:?}", c.name, c.best_label(&index));
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hash;
pub mod index;
pub mod persistence;
pub mod pipeline;
pub mod sequence;

pub use config::{GroupBy, Params, Strand};
pub use error::{IndexError, Result};
pub use hash::{FeatureGenerator, MinHashSigner, Signature, SparseFeatures};
pub use index::{
    Histogram, HistogramIndex, HistogramSummary, IndexSink, Neighborhood, NeighborhoodIndex,
};
pub use persistence::PersistenceError;
pub use pipeline::{
    ChunkSink, Classification, Classifier, Indexer, KnownIds, Progress, ProgressSnapshot,
    RunReport, SignaturePipeline,
};
pub use sequence::{FastaReader, SequenceRecord, SequenceSource, WindowSource};
