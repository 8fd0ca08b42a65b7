//! Index and pipeline parameters.
//!
//! A single [`Params`] value drives feature extraction, signing, indexing and
//! the pipeline. It is validated once, up front, so that no partial state is
//! created from a bad configuration.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What id a signature is inserted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// Every window is its own category, labeled `origin_start`.
    ByWindow,
    /// All windows of one named sequence share a category.
    #[default]
    BySequenceName,
    /// The category comes from an external coordinate table (BED name).
    ByExternalFeature,
    /// Sequential instance ids, no category labels.
    None,
}

/// Which strands are signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
    Both,
}

/// All numeric knobs of an indexing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Feature space is `[0, 2^hash_bits)`.
    pub hash_bits: u32,
    pub min_radius: u32,
    pub radius: u32,
    pub min_distance: u32,
    pub distance: u32,
    /// Final signature length.
    pub num_hash_functions: u32,
    /// Re-hashes per feature; 0 means `num_hash_functions * num_hash_shingles`.
    pub num_repeats_hash_function: u32,
    /// Raw minima collapsed into one final slot.
    pub num_hash_shingles: u32,
    pub max_size_bin: u32,
    /// Fraction of informative slots a neighbor must agree on.
    pub pure_approximate_sim: f64,
    /// Window length in bases; 0 signs whole sequences.
    pub seq_window: u32,
    /// Step between windows; 0 means non-overlapping windows.
    pub seq_shift: u32,
    /// Worker count; 0 means hardware concurrency.
    pub num_threads: u32,
    pub random_seed: u32,
    /// Instances per reader chunk.
    pub chunk_size: u32,
    /// Queue high-water mark as a multiple of the worker count.
    pub queue_factor: u32,
    pub strand: Strand,
    pub group_by: GroupBy,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            hash_bits: 30,
            min_radius: 0,
            radius: 2,
            min_distance: 0,
            distance: 4,
            num_hash_functions: 400,
            num_repeats_hash_function: 0,
            num_hash_shingles: 1,
            max_size_bin: 500,
            pure_approximate_sim: 0.5,
            seq_window: 0,
            seq_shift: 0,
            num_threads: 0,
            random_seed: 1,
            chunk_size: 64,
            queue_factor: 2,
            strand: Strand::Forward,
            group_by: GroupBy::BySequenceName,
        }
    }
}

impl Params {
    /// Parse parameters from JSON; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Params = serde_json::from_str(json)
            .map_err(|e| IndexError::config(format!("cannot parse parameters: {e}")))?;
        params.validate()?;
        Ok(params)
    }

    /// Read and validate a JSON parameter file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            IndexError::config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Reject inconsistent settings before any state is built.
    pub fn validate(&self) -> Result<()> {
        if self.hash_bits == 0 || self.hash_bits > 32 {
            return Err(IndexError::config(format!(
                "hash_bits must be in 1..=32, got {}",
                self.hash_bits
            )));
        }
        if self.min_radius > self.radius {
            return Err(IndexError::config(format!(
                "min_radius {} exceeds radius {}",
                self.min_radius, self.radius
            )));
        }
        if self.min_distance > self.distance {
            return Err(IndexError::config(format!(
                "min_distance {} exceeds distance {}",
                self.min_distance, self.distance
            )));
        }
        if self.num_hash_functions == 0 {
            return Err(IndexError::config("num_hash_functions must be positive"));
        }
        if self.num_hash_shingles == 0 {
            return Err(IndexError::config("num_hash_shingles must be positive"));
        }
        if self.num_repeats_hash_function != 0
            && (self.num_repeats_hash_function as usize) < self.raw_signature_len()
        {
            return Err(IndexError::config(format!(
                "num_repeats_hash_function {} is smaller than num_hash_functions * num_hash_shingles = {}",
                self.num_repeats_hash_function,
                self.raw_signature_len()
            )));
        }
        if self.max_size_bin == 0 {
            return Err(IndexError::config("max_size_bin must be positive"));
        }
        if !(0.0..=1.0).contains(&self.pure_approximate_sim) {
            return Err(IndexError::config(format!(
                "pure_approximate_sim must be in [0, 1], got {}",
                self.pure_approximate_sim
            )));
        }
        if self.seq_window == 0 && self.seq_shift != 0 {
            return Err(IndexError::config(
                "seq_shift requires a nonzero seq_window",
            ));
        }
        if self.chunk_size == 0 {
            return Err(IndexError::config("chunk_size must be positive"));
        }
        if self.queue_factor == 0 {
            return Err(IndexError::config("queue_factor must be positive"));
        }
        Ok(())
    }

    /// Worker threads to spawn.
    pub fn effective_threads(&self) -> usize {
        if self.num_threads > 0 {
            return self.num_threads as usize;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    /// Re-hashes per active feature.
    pub fn effective_repeats(&self) -> usize {
        if self.num_repeats_hash_function == 0 {
            self.raw_signature_len()
        } else {
            self.num_repeats_hash_function as usize
        }
    }

    /// Number of sub-range minima before shingling.
    pub fn raw_signature_len(&self) -> usize {
        self.num_hash_functions as usize * self.num_hash_shingles as usize
    }

    /// Mask selecting the low `hash_bits` bits.
    pub fn feature_mask(&self) -> u32 {
        if self.hash_bits >= 32 {
            u32::MAX
        } else {
            (1u32 << self.hash_bits) - 1
        }
    }

    /// Effective step between consecutive windows.
    pub fn effective_shift(&self) -> usize {
        if self.seq_shift == 0 {
            self.seq_window as usize
        } else {
            self.seq_shift as usize
        }
    }
}
