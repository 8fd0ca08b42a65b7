//! Snapshot header and little-endian field helpers.
//!
//! A snapshot starts with the magic bytes and format version, followed by
//! the parameters a reader needs to interpret (and keep extending) the
//! index: everything that shapes signatures, plus bin cap and histogram
//! size. Threading and queueing knobs are not stored.

use super::error::{PersistenceError, PersistenceResult};
use crate::config::Params;
use std::io::{Read, Write};

/// Magic bytes for histogram index snapshots.
pub const INDEX_MAGIC: [u8; 4] = *b"LSHX";

/// Current format version.
pub const FORMAT_VERSION: u32 = 2;

/// Largest `num_hash_functions` a snapshot may declare.
pub const MAX_HASH_FUNCTIONS: u32 = 1 << 16;

/// Largest `max_size_bin` a snapshot may declare.
pub const MAX_BIN_SIZE: u32 = 1 << 24;

/// Largest `histogram_size` a snapshot may declare; every query allocates
/// a histogram of this length.
pub const MAX_HISTOGRAM_SIZE: u32 = 1 << 24;

/// Parameters recorded at the head of every snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub hash_bits: u32,
    pub random_seed: u32,
    pub min_radius: u32,
    pub radius: u32,
    pub min_distance: u32,
    pub distance: u32,
    pub num_hash_functions: u32,
    pub num_hash_shingles: u32,
    pub num_repeats_hash_function: u32,
    pub seq_window: u32,
    pub seq_shift: u32,
    pub max_size_bin: u32,
    /// Highest category id plus one.
    pub histogram_size: u32,
}

impl SnapshotHeader {
    pub fn from_params(params: &Params, histogram_size: u32) -> Self {
        Self {
            hash_bits: params.hash_bits,
            random_seed: params.random_seed,
            min_radius: params.min_radius,
            radius: params.radius,
            min_distance: params.min_distance,
            distance: params.distance,
            num_hash_functions: params.num_hash_functions,
            num_hash_shingles: params.num_hash_shingles,
            num_repeats_hash_function: params.num_repeats_hash_function,
            seq_window: params.seq_window,
            seq_shift: params.seq_shift,
            max_size_bin: params.max_size_bin,
            histogram_size,
        }
    }

    /// Reject sizes no writer produces before anything is allocated from them.
    pub fn check_bounds(&self) -> PersistenceResult<()> {
        let limits = [
            ("num_hash_functions", self.num_hash_functions, MAX_HASH_FUNCTIONS),
            ("max_size_bin", self.max_size_bin, MAX_BIN_SIZE),
            ("histogram_size", self.histogram_size, MAX_HISTOGRAM_SIZE),
        ];
        for (field, value, max) in limits {
            if value > max {
                return Err(PersistenceError::Format(format!(
                    "{field} {value} exceeds limit {max}"
                )));
            }
        }
        Ok(())
    }

    /// Stored fields over default values for everything else.
    pub fn to_params(&self) -> Params {
        Params {
            hash_bits: self.hash_bits,
            random_seed: self.random_seed,
            min_radius: self.min_radius,
            radius: self.radius,
            min_distance: self.min_distance,
            distance: self.distance,
            num_hash_functions: self.num_hash_functions,
            num_hash_shingles: self.num_hash_shingles,
            num_repeats_hash_function: self.num_repeats_hash_function,
            seq_window: self.seq_window,
            seq_shift: self.seq_shift,
            max_size_bin: self.max_size_bin,
            ..Params::default()
        }
    }

    fn fields(&self) -> [u32; 13] {
        [
            self.hash_bits,
            self.random_seed,
            self.min_radius,
            self.radius,
            self.min_distance,
            self.distance,
            self.num_hash_functions,
            self.num_hash_shingles,
            self.num_repeats_hash_function,
            self.seq_window,
            self.seq_shift,
            self.max_size_bin,
            self.histogram_size,
        ]
    }

    /// Write magic, version and header fields.
    pub fn write_to<W: Write>(&self, w: &mut W) -> PersistenceResult<()> {
        w.write_all(&INDEX_MAGIC)?;
        write_u32(w, FORMAT_VERSION)?;
        for v in self.fields() {
            write_u32(w, v)?;
        }
        Ok(())
    }

    /// Read and check magic and version, then the header fields.
    pub fn read_from<R: Read>(r: &mut R) -> PersistenceResult<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(PersistenceError::from_read)?;
        if magic != INDEX_MAGIC {
            return Err(PersistenceError::Format(format!(
                "bad magic {magic:?}, expected {INDEX_MAGIC:?}"
            )));
        }
        let version = read_u32(r)?;
        if version != FORMAT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: FORMAT_VERSION,
                actual: version,
            });
        }
        let mut f = [0u32; 13];
        for v in f.iter_mut() {
            *v = read_u32(r)?;
        }
        Ok(Self {
            hash_bits: f[0],
            random_seed: f[1],
            min_radius: f[2],
            radius: f[3],
            min_distance: f[4],
            distance: f[5],
            num_hash_functions: f[6],
            num_hash_shingles: f[7],
            num_repeats_hash_function: f[8],
            seq_window: f[9],
            seq_shift: f[10],
            max_size_bin: f[11],
            histogram_size: f[12],
        })
    }
}

#[inline]
pub fn write_u32<W: Write>(w: &mut W, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

#[inline]
pub fn read_u32<R: Read>(r: &mut R) -> PersistenceResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(PersistenceError::from_read)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read exactly `len` bytes.
pub fn read_bytes<R: Read>(r: &mut R, len: usize) -> PersistenceResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(PersistenceError::from_read)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let params = Params {
            radius: 3,
            num_hash_shingles: 2,
            seq_window: 150,
            seq_shift: 50,
            ..Params::default()
        };
        let header = SnapshotHeader::from_params(&params, 17);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(&buf[..4], b"LSHX");
        assert_eq!(buf.len(), 4 + 4 + 13 * 4);

        let back = SnapshotHeader::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, header);
        let restored = back.to_params();
        assert_eq!(restored.radius, 3);
        assert_eq!(restored.seq_shift, 50);
    }

    #[test]
    fn oversized_header_fields_rejected() {
        let ok = SnapshotHeader::from_params(&Params::default(), 10);
        assert!(ok.check_bounds().is_ok());
        let huge_bin = SnapshotHeader {
            max_size_bin: u32::MAX,
            ..ok.clone()
        };
        assert!(matches!(huge_bin.check_bounds(), Err(PersistenceError::Format(_))));
        let huge_hist = SnapshotHeader {
            histogram_size: MAX_HISTOGRAM_SIZE + 1,
            ..ok
        };
        assert!(huge_hist.check_bounds().is_err());
    }

    #[test]
    fn bad_magic_rejected() {
        let buf = b"NOPE\x02\x00\x00\x00".to_vec();
        assert!(matches!(
            SnapshotHeader::read_from(&mut buf.as_slice()),
            Err(PersistenceError::Format(_))
        ));
    }

    #[test]
    fn version_mismatch_rejected() {
        let mut buf = INDEX_MAGIC.to_vec();
        buf.extend_from_slice(&1u32.to_le_bytes());
        assert!(matches!(
            SnapshotHeader::read_from(&mut buf.as_slice()),
            Err(PersistenceError::VersionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn truncated_header_is_format_error() {
        let buf = INDEX_MAGIC.to_vec();
        assert!(matches!(
            SnapshotHeader::read_from(&mut buf.as_slice()),
            Err(PersistenceError::Format(_))
        ));
    }
}
