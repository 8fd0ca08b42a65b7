//! Binary snapshots of a [`HistogramIndex`](crate::index::HistogramIndex).
//!
//! A snapshot is a single little-endian file: magic, format version, the
//! signature-shaping parameters, the category table and every slot's bins.
//! Identical index content always serializes to identical bytes.

pub mod error;
pub mod format;

pub use error::{PersistenceError, PersistenceResult};
pub use format::{SnapshotHeader, FORMAT_VERSION, INDEX_MAGIC};
