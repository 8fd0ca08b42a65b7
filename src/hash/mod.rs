//! Hashing primitives, feature extraction and MinHash signing.
//!
//! Every component hashes through the one deterministic family defined here:
//! an AP-style rolling hash over 32-bit symbols, finished with the murmur3
//! avalanche. Per-function seeds are derived from the configured random seed
//! with the splitmix64 finalizer, so a given `(params, input)` pair always
//! yields the same signature on every machine and in every thread.
//!
//! ## Pipeline of a window
//!
//! ```text
//! "ACGTTGCA"
//!     │  FeatureGenerator: rolling codes per (offset, radius),
//!     │  paired at distance d, hashed into [0, 2^hash_bits)
//!     ▼
//! {f1, f7, f93, ...}            sparse boolean feature vector
//!     │  MinHashSigner: R re-hashes per feature, min per sub-range,
//!     │  optional shingling of S raw minima into one slot
//!     ▼
//! [h1, h2, ..., hK]             fixed-length signature
//! ```
//!
//! ## Why minima
//!
//! For a random permutation π, `P[min π(A) = min π(B)] = J(A, B)`. Each
//! signature slot is one such draw, so the fraction of equal slots between two
//! signatures estimates their Jaccard similarity.
//!
//! ## References
//!
//! - Broder (1997). "On the resemblance and containment of documents."
//! - Li, Owen & Zhang (2012). "One permutation hashing."
//! - Costa & De Grave (2010). "Fast neighborhood subgraph pairwise distance kernel."

pub mod features;
pub mod minhash;

pub use features::{FeatureGenerator, SparseFeatures};
pub use minhash::{MinHashSigner, Signature, SENTINEL};

const AP_INIT: u32 = 0xAAAA_AAAA;

/// murmur3 32-bit finalizer.
#[inline]
pub fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// splitmix64 finalizer.
#[inline]
pub fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Incremental AP hash over a stream of 32-bit symbols.
///
/// `finish` can be called after every `push`; this is what makes the
/// per-radius neighborhood codes a single pass over the window.
#[derive(Debug, Clone, Copy)]
pub struct RollingHash {
    state: u32,
    len: u32,
}

impl RollingHash {
    pub fn new() -> Self {
        Self {
            state: AP_INIT,
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, value: u32) {
        let h = self.state;
        self.state ^= if self.len & 1 == 0 {
            (h << 7) ^ value.wrapping_mul(h >> 3)
        } else {
            !((h << 11).wrapping_add(value) ^ (h >> 5))
        };
        self.len = self.len.wrapping_add(1);
    }

    #[inline]
    pub fn finish(&self) -> u32 {
        fmix32(self.state ^ self.len)
    }
}

impl Default for RollingHash {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a sequence of integers.
pub fn hash_ints(values: &[u32]) -> u32 {
    let mut h = RollingHash::new();
    for &v in values {
        h.push(v);
    }
    h.finish()
}

/// Hash a byte string symbol by symbol.
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut h = RollingHash::new();
    for &b in bytes {
        h.push(b as u32);
    }
    h.finish()
}

/// Hash masked to `bits` low bits.
pub fn hash_masked(values: &[u32], mask: u32) -> u32 {
    hash_ints(values) & mask
}

/// Derive `n` independent 64-bit seeds from one session seed.
pub fn derive_seeds(random_seed: u32, n: usize) -> Vec<u64> {
    let base = mix64(random_seed as u64);
    (0..n as u64)
        .map(|j| mix64(base ^ j.wrapping_mul(0xd6e8_feb8_6659_fd93)))
        .collect()
}
