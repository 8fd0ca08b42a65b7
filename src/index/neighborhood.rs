//! Inverse index for approximate neighborhoods (clustering mode).
//!
//! One map per signature slot, from slot value to a [`Bin`] of instance ids.
//! Two instances are candidate neighbors when they share keys in enough
//! slots; a bin that grows past `max_size_bin` turns into an overflow marker
//! so that hot keys (low-complexity sequence, repeats) cannot degrade queries
//! into scans over most of the index.

use super::bin::Bin;
use super::categories::CategoryTable;
use super::IndexSink;
use crate::config::Params;
use crate::error::{IndexError, Result};
use crate::hash::Signature;
use std::collections::HashMap;
use tracing::trace;

/// One candidate and the number of slots it shares with the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub id: u32,
    pub agreement: u32,
}

/// Result of a neighborhood query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighborhood {
    /// Ranked by agreement (descending), then id.
    pub neighbors: Vec<Neighbor>,
    /// Query slots that hit an overflowed bin.
    pub collisions: usize,
    /// Mean agreement of retained neighbors over informative slots.
    pub density: f64,
}

impl Neighborhood {
    pub fn ids(&self) -> Vec<u32> {
        self.neighbors.iter().map(|n| n.id).collect()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

/// Size statistics for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborhoodStats {
    pub instances: usize,
    pub keys: usize,
    pub overflowed_bins: usize,
    pub largest_bin: usize,
}

/// LSH inverse index over instance ids.
#[derive(Debug, Clone)]
pub struct NeighborhoodIndex {
    num_hash_functions: usize,
    max_size_bin: usize,
    pure_approximate_sim: f64,
    slots: Vec<HashMap<u32, Bin>>,
    signatures: HashMap<u32, Signature>,
    cache: HashMap<u32, Neighborhood>,
    labels: CategoryTable,
}

impl NeighborhoodIndex {
    pub fn new(params: &Params) -> Result<Self> {
        params.validate()?;
        let num_hash_functions = params.num_hash_functions as usize;
        Ok(Self {
            num_hash_functions,
            max_size_bin: params.max_size_bin as usize,
            pure_approximate_sim: params.pure_approximate_sim,
            slots: (0..num_hash_functions).map(|_| HashMap::new()).collect(),
            signatures: HashMap::new(),
            cache: HashMap::new(),
            labels: CategoryTable::new(),
        })
    }

    /// Insert `signature` under `id` and remember it for later lookups.
    pub fn update_inverse_index(&mut self, signature: &Signature, id: u32) -> Result<()> {
        if signature.len() != self.num_hash_functions {
            return Err(IndexError::input(format!(
                "signature has {} slots, index expects {}",
                signature.len(),
                self.num_hash_functions
            )));
        }
        for (slot, key) in signature.keys() {
            match self.slots[slot].get_mut(&key) {
                None => {
                    self.slots[slot].insert(key, Bin::single(id));
                }
                Some(bin) => {
                    if bin.insert(id, self.max_size_bin) {
                        trace!(slot, key, "bin overflowed");
                    }
                }
            }
        }
        self.signatures.insert(id, signature.clone());
        self.cache.clear();
        Ok(())
    }

    /// Cached signature of an indexed instance.
    pub fn compute_hash_signature(&self, id: u32) -> Result<&Signature> {
        self.signatures
            .get(&id)
            .ok_or(IndexError::UnknownInstance(id))
    }

    /// Candidates agreeing with `signature` in at least
    /// `pure_approximate_sim * (num_hash_functions - collisions)` slots.
    pub fn compute_approximate_neighborhood(&self, signature: &Signature) -> Neighborhood {
        let mut tally: HashMap<u32, u32> = HashMap::new();
        let mut collisions = 0usize;
        for (slot, key) in signature.keys() {
            let Some(bin) = self.slots.get(slot).and_then(|m| m.get(&key)) else {
                continue;
            };
            if bin.is_overflow() {
                collisions += 1;
                continue;
            }
            for &id in bin.ids() {
                *tally.entry(id).or_insert(0) += 1;
            }
        }

        let informative = self.num_hash_functions.saturating_sub(collisions);
        if informative == 0 {
            return Neighborhood {
                collisions,
                ..Neighborhood::default()
            };
        }
        let threshold = self.pure_approximate_sim * informative as f64;
        let mut neighbors: Vec<Neighbor> = tally
            .into_iter()
            .filter(|&(_, agreement)| agreement as f64 >= threshold)
            .map(|(id, agreement)| Neighbor { id, agreement })
            .collect();
        neighbors.sort_unstable_by(|a, b| b.agreement.cmp(&a.agreement).then(a.id.cmp(&b.id)));

        let density = if neighbors.is_empty() {
            0.0
        } else {
            let total: u64 = neighbors.iter().map(|n| n.agreement as u64).sum();
            total as f64 / neighbors.len() as f64 / informative as f64
        };
        Neighborhood {
            neighbors,
            collisions,
            density,
        }
    }

    /// Neighborhood of an indexed instance, cached until the next insert.
    pub fn compute_neighborhood_ext(&mut self, id: u32) -> Result<&Neighborhood> {
        if !self.cache.contains_key(&id) {
            let signature = self.compute_hash_signature(id)?;
            let result = self.compute_approximate_neighborhood(signature);
            self.cache.insert(id, result);
        }
        self.cache
            .get(&id)
            .ok_or(IndexError::UnknownInstance(id))
    }

    /// Ranked neighbor ids of an indexed instance (includes the instance).
    pub fn compute_neighborhood(&mut self, id: u32) -> Result<Vec<u32>> {
        Ok(self.compute_neighborhood_ext(id)?.ids())
    }

    /// Fraction of slots on which two indexed instances agree.
    pub fn compute_approximate_similarity(&self, a: u32, b: u32) -> Result<f64> {
        let sa = self.compute_hash_signature(a)?;
        let sb = self.compute_hash_signature(b)?;
        Ok(sa.similarity(sb))
    }

    pub fn register_label(&mut self, id: u32, name: &str) -> bool {
        self.labels.insert_with_id(id, name)
    }

    pub fn labels(&self) -> &CategoryTable {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn num_hash_functions(&self) -> usize {
        self.num_hash_functions
    }

    pub fn stats(&self) -> NeighborhoodStats {
        let mut stats = NeighborhoodStats {
            instances: self.signatures.len(),
            ..NeighborhoodStats::default()
        };
        for bin in self.slots.iter().flat_map(|m| m.values()) {
            stats.keys += 1;
            if bin.is_overflow() {
                stats.overflowed_bins += 1;
            }
            stats.largest_bin = stats.largest_bin.max(bin.len());
        }
        stats
    }
}

impl IndexSink for NeighborhoodIndex {
    fn update(&mut self, signature: &Signature, id: u32) -> Result<()> {
        self.update_inverse_index(signature, id)
    }

    fn register_label(&mut self, id: u32, name: &str) -> Result<()> {
        if NeighborhoodIndex::register_label(self, id, name) {
            Ok(())
        } else {
            Err(IndexError::input(format!(
                "label {name:?} conflicts with an existing id binding for {id}"
            )))
        }
    }

    fn labels(&self) -> Option<&CategoryTable> {
        Some(&self.labels)
    }

    fn last_id(&self) -> u32 {
        let stored = self.signatures.keys().copied().max().unwrap_or(0);
        stored.max(self.labels.len() as u32)
    }
}
