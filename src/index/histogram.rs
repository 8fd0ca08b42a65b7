//! Inverse index for category histograms (classification mode).
//!
//! Each slot maps a signature value to a [`SortedBin`] of category ids. A
//! query signature votes, slot by slot, for every category found under its
//! key; the per-category vote count is the number of slots in which query and
//! category co-occur.
//!
//! # Snapshot layout
//!
//! All integers are little-endian `u32`.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ magic "LSHX", format version                 │
//! │ header: hash bits, seed, radius/distance     │
//! │   bounds, shingles, repeats, functions,      │
//! │   window, shift, max bin, histogram size     │
//! ├──────────────────────────────────────────────┤
//! │ categories: count, then (id, len, bytes)     │
//! ├──────────────────────────────────────────────┤
//! │ slots: count, then per slot                  │
//! │   key count, then (key, len, ids...)         │
//! │   len == 0 marks an overflowed bin           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Keys are written in ascending order, so equal indexes produce
//! byte-identical snapshots regardless of insertion order.

use super::bin::SortedBin;
use super::categories::CategoryTable;
use super::IndexSink;
use crate::config::Params;
use crate::error::{IndexError, Result};
use crate::hash::Signature;
use crate::persistence::format::{read_bytes, read_u32, write_u32, SnapshotHeader};
use crate::persistence::PersistenceError;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{info, trace};

const MAX_LABEL_BYTES: usize = 1 << 20;

/// Upper bound on capacity reserved from a stored length.
const MAX_RESERVE: usize = 4096;

/// Votes per category for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    /// Indexed by category id; entry 0 is unused.
    counts: Vec<u32>,
    empty_bins: u32,
    matched_slots: u32,
}

/// Aggregate numbers of a [`Histogram`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistogramSummary {
    pub sum: u64,
    pub max: u32,
    /// Query slots whose key was absent from the index.
    pub empty_bins: u32,
    /// Query slots that found a usable bin.
    pub matched_slots: u32,
}

impl Histogram {
    pub fn with_size(size: usize) -> Self {
        Self {
            counts: vec![0; size.max(1)],
            empty_bins: 0,
            matched_slots: 0,
        }
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn get(&self, category: u32) -> u32 {
        self.counts.get(category as usize).copied().unwrap_or(0)
    }

    pub fn empty_bins(&self) -> u32 {
        self.empty_bins
    }

    pub fn matched_slots(&self) -> u32 {
        self.matched_slots
    }

    /// Highest-scoring category; ties go to the lower id. `None` if no votes.
    pub fn best(&self) -> Option<(u32, u32)> {
        let mut best: Option<(u32, u32)> = None;
        for (id, &count) in self.counts.iter().enumerate().skip(1) {
            if count > 0 && best.map_or(true, |(_, c)| count > c) {
                best = Some((id as u32, count));
            }
        }
        best
    }

    /// Add another histogram's votes into this one.
    pub fn accumulate(&mut self, other: &Histogram) {
        if other.counts.len() > self.counts.len() {
            self.counts.resize(other.counts.len(), 0);
        }
        for (acc, &c) in self.counts.iter_mut().zip(other.counts.iter()) {
            *acc += c;
        }
        self.empty_bins += other.empty_bins;
        self.matched_slots += other.matched_slots;
    }

    pub fn summary(&self) -> HistogramSummary {
        HistogramSummary {
            sum: self.counts.iter().map(|&c| c as u64).sum(),
            max: self.counts.iter().copied().max().unwrap_or(0),
            empty_bins: self.empty_bins,
            matched_slots: self.matched_slots,
        }
    }
}

/// LSH inverse index over category ids.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramIndex {
    params: Params,
    slots: Vec<HashMap<u32, SortedBin>>,
    categories: CategoryTable,
    max_id: u32,
}

impl HistogramIndex {
    pub fn new(params: &Params) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params: params.clone(),
            slots: (0..params.num_hash_functions).map(|_| HashMap::new()).collect(),
            categories: CategoryTable::new(),
            max_id: 0,
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Add `category` to the bin of every informative slot.
    pub fn update_inverse_index(&mut self, signature: &Signature, category: u32) -> Result<()> {
        if signature.len() != self.slots.len() {
            return Err(IndexError::input(format!(
                "signature has {} slots, index expects {}",
                signature.len(),
                self.slots.len()
            )));
        }
        if category == 0 {
            return Err(IndexError::input("category id 0 is reserved"));
        }
        let cap = self.params.max_size_bin as usize;
        for (slot, key) in signature.keys() {
            let bin = self.slots[slot].entry(key).or_default();
            if bin.insert(category, cap) {
                trace!(slot, key, "histogram bin overflowed");
            }
        }
        self.max_id = self.max_id.max(category);
        Ok(())
    }

    /// Per-category co-occurrence counts for `signature`.
    pub fn compute_histogram(&self, signature: &Signature) -> Histogram {
        let mut hist = Histogram::with_size(self.histogram_size());
        for (slot, &value) in signature.values().iter().enumerate() {
            let bin = if crate::hash::minhash::is_key(value) {
                self.slots.get(slot).and_then(|m| m.get(&value))
            } else {
                None
            };
            match bin {
                None => hist.empty_bins += 1,
                Some(bin) if bin.is_poisoned() => {}
                Some(bin) => {
                    hist.matched_slots += 1;
                    for &id in bin.ids() {
                        if id as usize >= hist.counts.len() {
                            hist.counts.resize(id as usize + 1, 0);
                        }
                        hist.counts[id as usize] += 1;
                    }
                }
            }
        }
        hist
    }

    /// Bind a category name to an id. `false` on a conflicting binding.
    pub fn register_category(&mut self, id: u32, name: &str) -> bool {
        let ok = self.categories.insert_with_id(id, name);
        if ok {
            self.max_id = self.max_id.max(id);
        }
        ok
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    /// Length of histograms returned by [`Self::compute_histogram`].
    pub fn histogram_size(&self) -> usize {
        self.max_id as usize + 1
    }

    pub fn num_keys(&self) -> usize {
        self.slots.iter().map(HashMap::len).sum()
    }

    /// Serialize the index.
    pub fn write_binary_index<W: Write>(&self, w: &mut W) -> Result<()> {
        let header = SnapshotHeader::from_params(&self.params, self.histogram_size() as u32);
        header.write_to(w)?;

        let io = |e: std::io::Error| IndexError::Persistence(PersistenceError::Io(e));
        let labels: Vec<(u32, &str)> = self.categories.iter().collect();
        write_u32(w, labels.len() as u32).map_err(io)?;
        for (id, name) in labels {
            write_u32(w, id).map_err(io)?;
            write_u32(w, name.len() as u32).map_err(io)?;
            w.write_all(name.as_bytes()).map_err(io)?;
        }

        write_u32(w, self.slots.len() as u32).map_err(io)?;
        for slot in &self.slots {
            let mut keys: Vec<&u32> = slot.keys().collect();
            keys.sort_unstable();
            write_u32(w, keys.len() as u32).map_err(io)?;
            for key in keys {
                let bin = &slot[key];
                write_u32(w, *key).map_err(io)?;
                write_u32(w, bin.len() as u32).map_err(io)?;
                for &id in bin.ids() {
                    write_u32(w, id).map_err(io)?;
                }
            }
        }
        Ok(())
    }

    /// Deserialize an index written by [`Self::write_binary_index`].
    pub fn read_binary_index<R: Read>(r: &mut R) -> Result<Self> {
        let header = SnapshotHeader::read_from(r)?;
        header.check_bounds()?;
        let params = header.to_params();
        params
            .validate()
            .map_err(|e| PersistenceError::Format(format!("snapshot header: {e}")))?;
        let mut index = Self::new(&params)?;

        let num_labels = read_u32(r)?;
        for _ in 0..num_labels {
            let id = read_u32(r)?;
            if id >= header.histogram_size {
                return Err(PersistenceError::Format(format!(
                    "category {id} outside histogram of {}",
                    header.histogram_size
                ))
                .into());
            }
            let len = read_u32(r)? as usize;
            if len > MAX_LABEL_BYTES {
                return Err(PersistenceError::Format(format!("label of {len} bytes")).into());
            }
            let bytes = read_bytes(r, len)?;
            let name = String::from_utf8(bytes)
                .map_err(|_| PersistenceError::Format("label is not UTF-8".to_string()))?;
            if !index.register_category(id, &name) {
                return Err(
                    PersistenceError::Format(format!("duplicate category {id} {name:?}")).into(),
                );
            }
        }

        let num_slots = read_u32(r)? as usize;
        if num_slots != index.slots.len() {
            return Err(PersistenceError::Format(format!(
                "{num_slots} slots stored, header declares {}",
                index.slots.len()
            ))
            .into());
        }
        let cap = params.max_size_bin as usize;
        for slot in index.slots.iter_mut() {
            let num_keys = read_u32(r)?;
            for _ in 0..num_keys {
                let key = read_u32(r)?;
                let len = read_u32(r)? as usize;
                if len > cap {
                    return Err(PersistenceError::Format(format!(
                        "bin of {len} entries exceeds max_size_bin {cap}"
                    ))
                    .into());
                }
                let bin = if len == 0 {
                    SortedBin::poisoned()
                } else {
                    let mut ids = Vec::with_capacity(len.min(MAX_RESERVE));
                    for _ in 0..len {
                        let id = read_u32(r)?;
                        if id >= header.histogram_size {
                            return Err(PersistenceError::Format(format!(
                                "bin for key {key} holds category {id} outside histogram of {}",
                                header.histogram_size
                            ))
                            .into());
                        }
                        ids.push(id);
                    }
                    SortedBin::from_sorted(&ids).ok_or_else(|| {
                        PersistenceError::Format(format!("bin for key {key} is not sorted"))
                    })?
                };
                if let Some(&last) = bin.ids().last() {
                    index.max_id = index.max_id.max(last);
                }
                slot.insert(key, bin);
            }
        }
        let declared = header.histogram_size.saturating_sub(1);
        index.max_id = index.max_id.max(declared);
        Ok(index)
    }

    /// Write a snapshot file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(PersistenceError::Io)?;
        let mut w = BufWriter::new(file);
        self.write_binary_index(&mut w)?;
        w.flush().map_err(PersistenceError::Io)?;
        info!(
            path = %path.display(),
            categories = self.categories.len(),
            keys = self.num_keys(),
            "wrote histogram index"
        );
        Ok(())
    }

    /// Read a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(PersistenceError::Io)?;
        let index = Self::read_binary_index(&mut BufReader::new(file))?;
        info!(
            path = %path.display(),
            categories = index.categories.len(),
            keys = index.num_keys(),
            "loaded histogram index"
        );
        Ok(index)
    }
}

impl IndexSink for HistogramIndex {
    fn update(&mut self, signature: &Signature, id: u32) -> Result<()> {
        self.update_inverse_index(signature, id)
    }

    fn register_label(&mut self, id: u32, name: &str) -> Result<()> {
        if self.register_category(id, name) {
            Ok(())
        } else {
            Err(IndexError::input(format!(
                "category {name:?} conflicts with an existing id binding for {id}"
            )))
        }
    }

    fn labels(&self) -> Option<&CategoryTable> {
        Some(&self.categories)
    }

    fn last_id(&self) -> u32 {
        self.max_id
    }
}
