//! Sparse boolean feature vectors from sequence windows.
//!
//! A feature is an unordered pair of "neighborhood codes" (the hash of the
//! substring `[s, s + r]`) taken at two offsets `d` apart, together with
//! `(r, d)` themselves. Features are presence-only: a pair that occurs many
//! times in a window sets its coordinate once.

use super::{hash_masked, RollingHash};
use crate::config::Params;

/// Sorted, deduplicated set of active feature indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseFeatures {
    indices: Vec<u32>,
}

impl SparseFeatures {
    /// Build from arbitrary indices; duplicates collapse.
    pub fn from_unsorted(mut indices: Vec<u32>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// Exact Jaccard similarity, merge-walking both sorted lists.
    pub fn jaccard(&self, other: &SparseFeatures) -> f64 {
        if self.is_empty() && other.is_empty() {
            return 1.0;
        }
        let (mut i, mut j, mut common) = (0, 0, 0usize);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    common += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        let union = self.indices.len() + other.indices.len() - common;
        common as f64 / union as f64
    }
}

/// Turns one sequence window into a [`SparseFeatures`].
#[derive(Debug, Clone)]
pub struct FeatureGenerator {
    min_radius: usize,
    radius: usize,
    min_distance: usize,
    distance: usize,
    mask: u32,
}

impl FeatureGenerator {
    pub fn new(params: &Params) -> Self {
        Self {
            min_radius: params.min_radius as usize,
            radius: params.radius as usize,
            min_distance: params.min_distance as usize,
            distance: params.distance as usize,
            mask: params.feature_mask(),
        }
    }

    /// Rolling codes, row-major by offset: `codes[s * (radius + 1) + r]`.
    ///
    /// Substrings running past the end are clamped, so short windows yield
    /// repeated codes instead of an error.
    fn neighborhood_codes(&self, seq: &[u8]) -> Vec<u32> {
        let width = self.radius + 1;
        let mut codes = Vec::with_capacity(seq.len() * width);
        for s in 0..seq.len() {
            let mut h = RollingHash::new();
            for r in 0..width {
                if let Some(&b) = seq.get(s + r) {
                    h.push(b as u32);
                }
                codes.push(h.finish());
            }
        }
        codes
    }

    /// Features of one window. Pure function of `(seq, params)`.
    pub fn generate(&self, seq: &[u8]) -> SparseFeatures {
        let n = seq.len();
        if n == 0 {
            return SparseFeatures::default();
        }
        let width = self.radius + 1;
        let codes = self.neighborhood_codes(seq);

        let pairs = (self.radius - self.min_radius + 1) * (self.distance - self.min_distance + 1);
        let mut raw = Vec::with_capacity(pairs * n);
        for r in self.min_radius..=self.radius {
            for d in self.min_distance..=self.distance {
                for s in 0..n {
                    let t = (s + d).min(n - 1);
                    let a = codes[s * width + r];
                    let b = codes[t * width + r];
                    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                    raw.push(hash_masked(&[r as u32, d as u32, lo, hi], self.mask));
                }
            }
        }
        SparseFeatures::from_unsorted(raw)
    }
}
