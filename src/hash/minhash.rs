//! MinHash signatures for Jaccard similarity estimation.
//!
//! ## Algorithm
//!
//! Every active feature is re-hashed `R` times (one seed per repeat). The
//! 32-bit hash space is split into `K = num_hash_functions * num_hash_shingles`
//! equal sub-ranges; each re-hash lands in exactly one sub-range and that
//! sub-range keeps its minimum. Sub-range `k` is therefore an independent
//! min-wise draw and
//!
//! ```text
//! P[sig_k(A) = sig_k(B)] = |A ∩ B| / |A ∪ B|
//! ```
//!
//! whenever at least one of the two sets put a sample into it.
//!
//! With shingling (`S > 1`), each run of `S` consecutive minima is collapsed
//! by a combining hash into one final slot. Two slots then agree only when all
//! `S` underlying minima agree, i.e. with probability `J^S`, which sharpens
//! the index toward near-duplicates while shrinking the signature.
//!
//! ## References
//!
//! - Broder (1997). "On the resemblance and containment of documents"
//! - Li, Owen & Zhang (2012). "One permutation hashing"

use super::{derive_seeds, hash_ints, mix64, SparseFeatures};
use crate::config::Params;

/// Slot value meaning "no feature fell into this sub-range".
pub const SENTINEL: u32 = u32::MAX;

/// Keep real hash values clear of `0` and [`SENTINEL`]; indexes treat both
/// as "no key".
#[inline]
fn informative(h: u32) -> u32 {
    match h {
        0 => 1,
        SENTINEL => SENTINEL - 1,
        h => h,
    }
}

/// A fixed-length MinHash signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    values: Vec<u32>,
}

impl Signature {
    pub fn new(values: Vec<u32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(slot, key)` pairs for every slot carrying a usable key.
    pub fn keys(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.values
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, v)| is_key(v))
    }

    /// Slots that saw at least one feature.
    pub fn informative_slots(&self) -> usize {
        self.values.iter().filter(|&&v| is_key(v)).count()
    }

    /// Number of slots where both signatures hold the same usable key.
    pub fn agreement(&self, other: &Signature) -> usize {
        self.values
            .iter()
            .zip(other.values.iter())
            .filter(|(&a, &b)| a == b && is_key(a))
            .count()
    }

    /// Estimated Jaccard similarity. Signatures of different length score 0.
    pub fn similarity(&self, other: &Signature) -> f64 {
        if self.values.len() != other.values.len() || self.values.is_empty() {
            return 0.0;
        }
        self.agreement(other) as f64 / self.values.len() as f64
    }
}

/// True for values that can act as an index key.
#[inline]
pub fn is_key(value: u32) -> bool {
    value != SENTINEL && value != 0
}

/// Signs sparse feature vectors.
///
/// Seeds are derived from `random_seed`, so two signers built from the same
/// [`Params`] produce identical signatures.
#[derive(Debug, Clone)]
pub struct MinHashSigner {
    num_hash_functions: usize,
    num_shingles: usize,
    raw_len: usize,
    seeds: Vec<u64>,
}

impl MinHashSigner {
    pub fn new(params: &Params) -> Self {
        Self {
            num_hash_functions: params.num_hash_functions as usize,
            num_shingles: params.num_hash_shingles as usize,
            raw_len: params.raw_signature_len(),
            seeds: derive_seeds(params.random_seed, params.effective_repeats()),
        }
    }

    /// Final signature length.
    pub fn num_hash_functions(&self) -> usize {
        self.num_hash_functions
    }

    #[inline]
    fn rehash(feature: u32, seed: u64) -> u32 {
        informative((mix64(feature as u64 ^ seed) >> 32) as u32)
    }

    /// Sub-range of a 32-bit hash among `raw_len` equal ranges.
    #[inline]
    fn sub_range(&self, h: u32) -> usize {
        ((h as u64 * self.raw_len as u64) >> 32) as usize
    }

    /// Per-sub-range minima before shingling.
    pub fn raw_minima(&self, features: &SparseFeatures) -> Vec<u32> {
        let mut mins = vec![SENTINEL; self.raw_len];
        for &feature in features.indices() {
            for &seed in &self.seeds {
                let h = Self::rehash(feature, seed);
                let slot = &mut mins[self.sub_range(h)];
                if h < *slot {
                    *slot = h;
                }
            }
        }
        mins
    }

    /// Signature of a feature vector.
    pub fn sign(&self, features: &SparseFeatures) -> Signature {
        let raw = self.raw_minima(features);
        if self.num_shingles == 1 {
            return Signature::new(raw);
        }
        let values = raw
            .chunks(self.num_shingles)
            .map(|block| {
                if block.iter().all(|&v| v == SENTINEL) {
                    SENTINEL
                } else {
                    informative(hash_ints(block))
                }
            })
            .collect();
        Signature::new(values)
    }
}
