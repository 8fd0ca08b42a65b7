//! Edge cases: degenerate inputs, bad configuration, damaged snapshots.

use seqlsh::persistence::format::MAX_BIN_SIZE;
use seqlsh::persistence::{PersistenceError, FORMAT_VERSION};
use seqlsh::sequence::SequenceSource;
use seqlsh::{
    GroupBy, HistogramIndex, IndexError, NeighborhoodIndex, Params, SequenceRecord, Signature,
    SignaturePipeline, WindowSource,
};
use std::io::Write;

fn tiny() -> Params {
    Params {
        num_hash_functions: 16,
        num_threads: 2,
        ..Params::default()
    }
}

#[test]
fn window_shorter_than_radius_still_signs() {
    let params = Params {
        radius: 6,
        distance: 8,
        ..tiny()
    };
    let pipeline = SignaturePipeline::new(&params).unwrap();
    let sig = pipeline.sign(b"AC");
    assert_eq!(sig.len(), 16);
    assert!(sig.informative_slots() > 0);
}

#[test]
fn sequence_shorter_than_window_is_one_instance() {
    let params = Params {
        seq_window: 100,
        seq_shift: 10,
        ..tiny()
    };
    let mut src = WindowSource::from_records(vec![SequenceRecord::new("s", "ACGTACGT")], &params);
    let w = src.next_window().unwrap().unwrap();
    assert_eq!(w.text, b"ACGTACGT");
    assert!(w.is_last);
    assert!(src.next_window().unwrap().is_none());
}

#[test]
fn ungrouped_instances_get_sequential_ids() {
    let params = Params {
        group_by: GroupBy::None,
        seq_window: 8,
        ..tiny()
    };
    let pipeline = SignaturePipeline::new(&params).unwrap();
    let source = WindowSource::from_records(
        vec![
            SequenceRecord::new("a", "ACGTACGTTTGGCCAA"),
            SequenceRecord::new("b", "GGGGCCCC"),
        ],
        &params,
    );
    let (index, _) = pipeline
        .index_into(source, NeighborhoodIndex::new(&params).unwrap())
        .unwrap();
    assert_eq!(index.len(), 3);
    assert!(index.compute_hash_signature(3).is_ok());
    assert!(index.labels().is_empty());
}

#[test]
fn unknown_instance_is_reported() {
    let index = NeighborhoodIndex::new(&tiny()).unwrap();
    assert!(matches!(
        index.compute_approximate_similarity(1, 2),
        Err(IndexError::UnknownInstance(1))
    ));
}

#[test]
fn zero_similarity_accepts_any_shared_slot() {
    let params = Params {
        num_hash_functions: 3,
        pure_approximate_sim: 0.0,
        ..tiny()
    };
    let mut index = NeighborhoodIndex::new(&params).unwrap();
    index.update_inverse_index(&Signature::new(vec![1, 2, 3]), 1).unwrap();
    index.update_inverse_index(&Signature::new(vec![1, 9, 9]), 2).unwrap();
    index.update_inverse_index(&Signature::new(vec![8, 9, 7]), 3).unwrap();
    let hood = index.compute_approximate_neighborhood(&Signature::new(vec![1, 2, 3]));
    assert_eq!(hood.ids(), vec![1, 2]);
}

#[test]
fn all_sentinel_query_finds_nothing() {
    let mut index = HistogramIndex::new(&tiny()).unwrap();
    let sig = Signature::new((1..=16).collect());
    index.update_inverse_index(&sig, 1).unwrap();
    let empty = Signature::new(vec![seqlsh::hash::SENTINEL; 16]);
    let hist = index.compute_histogram(&empty);
    assert_eq!(hist.summary().sum, 0);
    assert_eq!(hist.empty_bins(), 16);
    assert_eq!(hist.best(), None);
}

#[test]
fn bad_json_config_is_config_error() {
    assert!(matches!(
        Params::from_json_str("{ not json"),
        Err(IndexError::InvalidConfig(_))
    ));
    assert!(matches!(
        Params::from_json_str(r#"{"pure_approximate_sim": 1.5}"#),
        Err(IndexError::InvalidConfig(_))
    ));
}

#[test]
fn config_file_round_trip() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(f, r#"{{"seq_window": 150, "seq_shift": 50, "num_threads": 3}}"#).unwrap();
    let params = Params::load(f.path()).unwrap();
    assert_eq!(params.seq_window, 150);
    assert_eq!(params.effective_threads(), 3);
}

#[test]
fn headerless_fasta_is_input_error() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "ACGTACGT").unwrap();
    let params = tiny();
    let mut src = WindowSource::from_files(vec![f.path().to_path_buf()], &params).unwrap();
    assert!(matches!(
        src.next_window(),
        Err(IndexError::InputFormat(_))
    ));
}

#[test]
fn pipeline_surfaces_input_errors() {
    let params = tiny();
    let pipeline = SignaturePipeline::new(&params).unwrap();
    let source = WindowSource::from_records(
        vec![
            SequenceRecord::new("ok", "ACGTACGT"),
            SequenceRecord::new("", "ACGT"),
        ],
        &params,
    );
    let result = pipeline.index_into(source, HistogramIndex::new(&params).unwrap());
    assert!(matches!(result, Err(IndexError::InputFormat(_))));
}

#[test]
fn missing_snapshot_is_io_error() {
    let result = HistogramIndex::load("/nonexistent/index.lshx");
    assert!(matches!(
        result,
        Err(IndexError::Persistence(PersistenceError::Io(_)))
    ));
}

#[test]
fn snapshot_from_other_version_rejected() {
    let index = HistogramIndex::new(&tiny()).unwrap();
    let mut buf = Vec::new();
    index.write_binary_index(&mut buf).unwrap();
    buf[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    assert!(matches!(
        HistogramIndex::read_binary_index(&mut buf.as_slice()),
        Err(IndexError::Persistence(PersistenceError::VersionMismatch { .. }))
    ));
}

#[test]
fn oversized_bin_in_snapshot_rejected() {
    let params = Params {
        num_hash_functions: 1,
        max_size_bin: 2,
        ..tiny()
    };
    let mut index = HistogramIndex::new(&params).unwrap();
    index.update_inverse_index(&Signature::new(vec![5]), 1).unwrap();
    let mut buf = Vec::new();
    index.write_binary_index(&mut buf).unwrap();
    // trailing section: slot count, key count, key, bin length, id
    let len_at = buf.len() - 8;
    buf[len_at..len_at + 4].copy_from_slice(&3u32.to_le_bytes());
    buf.extend_from_slice(&[2, 0, 0, 0, 3, 0, 0, 0]);
    assert!(matches!(
        HistogramIndex::read_binary_index(&mut buf.as_slice()),
        Err(IndexError::Persistence(PersistenceError::Format(_)))
    ));
}

#[test]
fn huge_declared_bin_is_format_error() {
    let params = Params {
        num_hash_functions: 1,
        max_size_bin: 2,
        ..tiny()
    };
    let mut index = HistogramIndex::new(&params).unwrap();
    index.update_inverse_index(&Signature::new(vec![5]), 1).unwrap();
    let mut buf = Vec::new();
    index.write_binary_index(&mut buf).unwrap();
    // max_size_bin is the twelfth header field after magic and version
    let cap_at = 8 + 11 * 4;
    let len_at = buf.len() - 8;

    let mut unbounded = buf.clone();
    unbounded[cap_at..cap_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    unbounded[len_at..len_at + 4].copy_from_slice(&0xF000_0000u32.to_le_bytes());
    assert!(matches!(
        HistogramIndex::read_binary_index(&mut unbounded.as_slice()),
        Err(IndexError::Persistence(PersistenceError::Format(_)))
    ));

    let mut truncated = buf;
    truncated[cap_at..cap_at + 4].copy_from_slice(&MAX_BIN_SIZE.to_le_bytes());
    truncated[len_at..len_at + 4].copy_from_slice(&MAX_BIN_SIZE.to_le_bytes());
    assert!(matches!(
        HistogramIndex::read_binary_index(&mut truncated.as_slice()),
        Err(IndexError::Persistence(PersistenceError::Format(_)))
    ));
}

#[test]
fn category_outside_histogram_is_format_error() {
    let params = Params {
        num_hash_functions: 1,
        ..tiny()
    };
    let mut index = HistogramIndex::new(&params).unwrap();
    index.update_inverse_index(&Signature::new(vec![5]), 1).unwrap();
    let mut buf = Vec::new();
    index.write_binary_index(&mut buf).unwrap();
    let id_at = buf.len() - 4;
    buf[id_at..].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        HistogramIndex::read_binary_index(&mut buf.as_slice()),
        Err(IndexError::Persistence(PersistenceError::Format(_)))
    ));
}
