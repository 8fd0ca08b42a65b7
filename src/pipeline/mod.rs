//! Concurrent signature pipeline.
//!
//! ```text
//!   reader ──chunks──▶ [bounded] ──▶ workers × N ──▶ [bounded] ──▶ finisher
//!   (ids, labels)                    (features,                   (ChunkSink)
//!                                      signatures)
//! ```
//!
//! The reader pulls windows from a [`SequenceSource`], assigns group and
//! origin ids in input order, and batches instances into chunks. Group ids
//! continue after the ids the sink already holds, and are skipped entirely
//! for sinks that never read them (classification). Workers
//! sign chunks in parallel; the finisher hands them to a [`ChunkSink`] in
//! arrival order. Both queues hold at most `queue_factor * workers` chunks,
//! so a slow finisher stalls the reader instead of growing memory.
//!
//! Ids never depend on worker scheduling, and both index types are
//! insensitive to commit order, so a run over the same input yields the same
//! index for any thread count.
//!
//! Shutdown is channel-driven: the reader drops its sender at end of input,
//! which drains the workers, which drains the finisher. On the first error
//! a shared flag stops every stage early and the error is returned after all
//! threads are joined.

mod progress;
mod sink;

pub use progress::{Progress, ProgressSnapshot};
pub use sink::{ChunkSink, Classification, Classifier, Indexer, KnownIds};

use crate::config::{GroupBy, Params};
use crate::error::{IndexError, Result};
use crate::hash::{FeatureGenerator, MinHashSigner, Signature};
use crate::index::{CategoryTable, HistogramIndex, IndexSink};
use crate::sequence::{SequenceSource, StrandKind, Window};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One window on its way through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Id the signature is inserted under; 0 for sinks that ignore groups.
    pub group: u32,
    /// 1-based ordinal of the originating sequence (or interval).
    pub origin: u32,
    /// Position of this window among its origin's windows.
    pub fragment: u32,
    pub is_last: bool,
    pub start: usize,
    pub strand: StrandKind,
    /// Window text; released once the instance is signed.
    pub text: Vec<u8>,
    pub signature: Signature,
}

/// A batch of instances plus the ids first handed out while reading it.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub(crate) index: u64,
    pub(crate) instances: Vec<Instance>,
    pub(crate) labels: Vec<(u32, String)>,
    pub(crate) origins: Vec<(u32, String)>,
}

impl Chunk {
    /// Position of this chunk in reader order.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Group labels seen for the first time in this chunk.
    pub fn labels(&self) -> &[(u32, String)] {
        &self.labels
    }

    /// Origins whose first window is in this chunk.
    pub fn origins(&self) -> &[(u32, String)] {
        &self.origins
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Counter deltas for this run.
    pub progress: ProgressSnapshot,
    pub elapsed: Duration,
}

/// First error wins; everyone else just stops.
#[derive(Default)]
struct Shutdown {
    cancelled: AtomicBool,
    error: Mutex<Option<IndexError>>,
}

impl Shutdown {
    fn fail(&self, stage: &str, err: IndexError) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            warn!(stage, error = %err, "pipeline cancelled");
            *slot = Some(err);
        }
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn take(&self) -> Option<IndexError> {
        self.error.lock().take()
    }
}

/// Maps windows to group and origin ids, in input order.
///
/// Group numbering continues after the ids the sink already holds; with
/// `group_by` unset every group is 0.
struct IdAssigner {
    group_by: Option<GroupBy>,
    groups: CategoryTable,
    next_instance: u32,
    next_origin: u32,
    fragment: u32,
}

impl IdAssigner {
    fn new(group_by: Option<GroupBy>, known: KnownIds) -> Self {
        let mut groups = known.labels;
        groups.reserve_through(known.last_id);
        Self {
            group_by,
            groups,
            next_instance: known.last_id,
            next_origin: 0,
            fragment: 0,
        }
    }

    fn group_id(&mut self, window: &Window, chunk: &mut Chunk) -> Result<u32> {
        let Some(group_by) = self.group_by else {
            return Ok(0);
        };
        let label = match group_by {
            GroupBy::BySequenceName => window.origin.clone(),
            GroupBy::ByWindow => match window.strand {
                StrandKind::Forward => format!("{}_{}", window.origin, window.start),
                StrandKind::Reverse => format!("{}_{}_rc", window.origin, window.start),
            },
            GroupBy::ByExternalFeature => match &window.feature {
                Some(feature) => feature.clone(),
                None => {
                    return Err(IndexError::input(format!(
                        "window of {} carries no external feature",
                        window.origin
                    )))
                }
            },
            GroupBy::None => {
                self.next_instance += 1;
                return Ok(self.next_instance);
            }
        };
        let (id, fresh) = self.groups.get_or_insert(&label);
        if fresh {
            chunk.labels.push((id, label));
        }
        Ok(id)
    }

    fn assign(&mut self, window: Window, chunk: &mut Chunk) -> Result<Instance> {
        let group = self.group_id(&window, chunk)?;

        if self.fragment == 0 {
            self.next_origin += 1;
            chunk.origins.push((self.next_origin, window.origin));
        }
        let fragment = self.fragment;
        self.fragment = if window.is_last { 0 } else { fragment + 1 };

        Ok(Instance {
            group,
            origin: self.next_origin,
            fragment,
            is_last: window.is_last,
            start: window.start,
            strand: window.strand,
            text: window.text,
            signature: Signature::default(),
        })
    }
}

/// Reader → workers → finisher, parameterized by a [`ChunkSink`].
pub struct SignaturePipeline {
    params: Params,
    generator: FeatureGenerator,
    signer: MinHashSigner,
    progress: Arc<Progress>,
}

impl SignaturePipeline {
    /// Validates `params`; nothing is started yet.
    pub fn new(params: &Params) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params: params.clone(),
            generator: FeatureGenerator::new(params),
            signer: MinHashSigner::new(params),
            progress: Arc::new(Progress::new()),
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Shared counters; cumulative over every run of this pipeline.
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Sign one window on the calling thread.
    pub fn sign(&self, text: &[u8]) -> Signature {
        self.signer.sign(&self.generator.generate(text))
    }

    /// Run the pipeline until `source` is exhausted and every instance has
    /// been committed to `sink`.
    pub fn run<S, K>(&self, source: S, sink: &mut K) -> Result<RunReport>
    where
        S: SequenceSource + Send,
        K: ChunkSink + Send,
    {
        let workers = self.params.effective_threads().max(1);
        let depth = workers * self.params.queue_factor as usize;
        let chunk_size = self.params.chunk_size as usize;
        info!(workers, queue_depth = depth, chunk_size, "pipeline starting");

        let group_by = sink.uses_groups().then_some(self.params.group_by);
        let ids = IdAssigner::new(group_by, sink.known_ids());

        let clock = Instant::now();
        let before = self.progress.snapshot();
        let shutdown = Shutdown::default();
        let (raw_tx, raw_rx) = bounded::<Chunk>(depth);
        let (signed_tx, signed_rx) = bounded::<Chunk>(depth);

        let panicked = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers + 2);

            let shutdown = &shutdown;
            let sink = &mut *sink;
            let reader =
                scope.spawn(move || self.read_stage(source, ids, chunk_size, raw_tx, shutdown));
            handles.push(("reader", reader));

            for _ in 0..workers {
                let rx = raw_rx.clone();
                let tx = signed_tx.clone();
                handles.push(("worker", scope.spawn(move || self.work_stage(rx, tx, shutdown))));
            }
            drop(raw_rx);
            drop(signed_tx);

            let finisher = scope.spawn(move || self.finish_stage(signed_rx, sink, shutdown));
            handles.push(("finisher", finisher));

            let mut panicked = Vec::new();
            for (stage, handle) in handles {
                if handle.join().is_err() {
                    shutdown.cancelled.store(true, Ordering::Release);
                    panicked.push(stage);
                }
            }
            panicked
        });

        if let Some(err) = shutdown.take() {
            return Err(err);
        }
        if let Some(stage) = panicked.first() {
            return Err(IndexError::Pipeline(format!("{stage} thread panicked")));
        }

        let progress = self.progress.snapshot().since(&before);
        if progress.instances_read == 0 {
            return Err(IndexError::NoInstances);
        }
        if !progress.is_settled() {
            return Err(IndexError::Pipeline(format!(
                "{} instances read but {} committed",
                progress.instances_read, progress.instances_committed
            )));
        }
        sink.finish()?;

        let elapsed = clock.elapsed();
        info!(
            instances = progress.instances_read,
            chunks = progress.chunks_committed,
            files = progress.files_done,
            elapsed_ms = elapsed.as_millis() as u64,
            "pipeline finished"
        );
        Ok(RunReport { progress, elapsed })
    }

    /// Build an index from `source`.
    pub fn index_into<S, I>(&self, source: S, index: I) -> Result<(I, RunReport)>
    where
        S: SequenceSource + Send,
        I: IndexSink + Send,
    {
        let mut indexer = Indexer::new(index);
        let report = self.run(source, &mut indexer)?;
        Ok((indexer.into_inner(), report))
    }

    /// Classify every origin of `source` against `index`.
    pub fn classify<S>(
        &self,
        source: S,
        index: &HistogramIndex,
    ) -> Result<(Vec<Classification>, RunReport)>
    where
        S: SequenceSource + Send,
    {
        let mut classifier = Classifier::new(index);
        let report = self.run(source, &mut classifier)?;
        Ok((classifier.into_results(), report))
    }

    fn read_stage<S: SequenceSource>(
        &self,
        mut source: S,
        mut ids: IdAssigner,
        chunk_size: usize,
        tx: Sender<Chunk>,
        shutdown: &Shutdown,
    ) {
        let base_files = self.progress.snapshot().files_done;
        let mut chunk = Chunk::default();
        let mut next_index = 0u64;

        while !shutdown.is_cancelled() {
            let window = match source.next_window() {
                Ok(Some(window)) => window,
                Ok(None) => break,
                Err(err) => {
                    shutdown.fail("reader", err);
                    return;
                }
            };
            match ids.assign(window, &mut chunk) {
                Ok(inst) => chunk.instances.push(inst),
                Err(err) => {
                    shutdown.fail("reader", err);
                    return;
                }
            }
            self.progress.add_read(1);
            self.progress.record_files_done(base_files, source.files_done());

            if chunk.instances.len() >= chunk_size {
                let full = std::mem::replace(
                    &mut chunk,
                    Chunk {
                        index: next_index + 1,
                        ..Chunk::default()
                    },
                );
                next_index += 1;
                if tx.send(full).is_err() {
                    return;
                }
            }
        }
        self.progress.record_files_done(base_files, source.files_done());
        if !chunk.instances.is_empty() && !shutdown.is_cancelled() {
            let _ = tx.send(chunk);
        }
        debug!(chunks = next_index + 1, "reader done");
    }

    fn work_stage(&self, rx: Receiver<Chunk>, tx: Sender<Chunk>, shutdown: &Shutdown) {
        for mut chunk in rx.iter() {
            if shutdown.is_cancelled() {
                return;
            }
            for inst in chunk.instances.iter_mut() {
                let features = self.generator.generate(&inst.text);
                inst.signature = self.signer.sign(&features);
                inst.text = Vec::new();
            }
            self.progress.add_signed(chunk.instances.len() as u64);
            if tx.send(chunk).is_err() {
                return;
            }
        }
    }

    fn finish_stage<K: ChunkSink>(&self, rx: Receiver<Chunk>, sink: &mut K, shutdown: &Shutdown) {
        for chunk in rx.iter() {
            if shutdown.is_cancelled() {
                return;
            }
            if let Err(err) = commit(sink, &chunk) {
                shutdown.fail("finisher", err);
                return;
            }
            self.progress.add_committed(chunk.instances.len() as u64);
        }
    }
}

fn commit<K: ChunkSink>(sink: &mut K, chunk: &Chunk) -> Result<()> {
    for (id, name) in &chunk.labels {
        sink.register_label(*id, name)?;
    }
    sink.commit(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::NeighborhoodIndex;
    use crate::sequence::{SequenceRecord, WindowSource};

    fn params(threads: u32) -> Params {
        Params {
            num_hash_functions: 32,
            radius: 1,
            distance: 2,
            num_threads: threads,
            chunk_size: 2,
            ..Params::default()
        }
    }

    fn records() -> Vec<SequenceRecord> {
        vec![
            SequenceRecord::new("a", "ACGTACGTACGTTTGA"),
            SequenceRecord::new("b", "GGGGGGGGGGGGGGGG"),
            SequenceRecord::new("c", "ACGTACGTACGTTTGA"),
        ]
    }

    struct Failing;

    impl SequenceSource for Failing {
        fn next_window(&mut self) -> Result<Option<Window>> {
            Err(IndexError::input("broken record"))
        }
    }

    struct Panicking;

    impl ChunkSink for Panicking {
        fn commit(&mut self, _chunk: &Chunk) -> Result<()> {
            panic!("sink exploded");
        }
    }

    #[test]
    fn ids_follow_input_order() {
        let p = Params {
            seq_window: 4,
            ..params(1)
        };
        let mut ids = IdAssigner::new(Some(GroupBy::BySequenceName), KnownIds::default());
        let mut chunk = Chunk::default();
        let mut src = WindowSource::from_records(records(), &p);
        let mut out = Vec::new();
        while let Some(w) = src.next_window().unwrap() {
            out.push(ids.assign(w, &mut chunk).unwrap());
        }
        assert_eq!(out.len(), 12);
        assert_eq!(out[0].group, 1);
        assert_eq!(out[3].fragment, 3);
        assert!(out[3].is_last);
        assert_eq!(out[4].origin, 2);
        assert_eq!(out[4].fragment, 0);
        assert_eq!(chunk.labels.len(), 3);
        assert_eq!(chunk.origins[2], (3, "c".to_string()));
    }

    #[test]
    fn by_window_labels_include_offset() {
        let mut ids = IdAssigner::new(Some(GroupBy::ByWindow), KnownIds::default());
        let mut chunk = Chunk::default();
        let window = Window {
            text: b"ACGT".to_vec(),
            origin: "s".to_string(),
            start: 8,
            strand: StrandKind::Reverse,
            is_last: true,
            feature: None,
        };
        ids.assign(window, &mut chunk).unwrap();
        assert_eq!(chunk.labels[0], (1, "s_8_rc".to_string()));
    }

    #[test]
    fn missing_feature_is_input_error() {
        let mut ids = IdAssigner::new(Some(GroupBy::ByExternalFeature), KnownIds::default());
        let window = Window {
            text: b"ACGT".to_vec(),
            origin: "s".to_string(),
            start: 0,
            strand: StrandKind::Forward,
            is_last: true,
            feature: None,
        };
        assert!(matches!(
            ids.assign(window, &mut Chunk::default()),
            Err(IndexError::InputFormat(_))
        ));
    }

    #[test]
    fn numbering_continues_after_known_ids() {
        let mut labels = CategoryTable::new();
        labels.insert_with_id(1, "alpha");
        let known = KnownIds {
            labels,
            last_id: 3,
        };
        let mut ids = IdAssigner::new(Some(GroupBy::BySequenceName), known.clone());
        let mut chunk = Chunk::default();
        let window = |origin: &str| Window {
            text: b"ACGT".to_vec(),
            origin: origin.to_string(),
            start: 0,
            strand: StrandKind::Forward,
            is_last: true,
            feature: None,
        };
        assert_eq!(ids.assign(window("alpha"), &mut chunk).unwrap().group, 1);
        assert_eq!(ids.assign(window("beta"), &mut chunk).unwrap().group, 4);
        assert_eq!(chunk.labels, vec![(4, "beta".to_string())]);

        let mut plain = IdAssigner::new(Some(GroupBy::None), known);
        assert_eq!(plain.assign(window("x"), &mut chunk).unwrap().group, 4);
    }

    #[test]
    fn groups_skipped_when_unused() {
        let mut ids = IdAssigner::new(None, KnownIds::default());
        let mut chunk = Chunk::default();
        let window = Window {
            text: b"ACGT".to_vec(),
            origin: "read".to_string(),
            start: 0,
            strand: StrandKind::Forward,
            is_last: true,
            feature: None,
        };
        let inst = ids.assign(window, &mut chunk).unwrap();
        assert_eq!(inst.group, 0);
        assert_eq!(inst.origin, 1);
        assert!(chunk.labels.is_empty());
    }

    #[test]
    fn run_commits_everything() {
        let pipeline = SignaturePipeline::new(&params(3)).unwrap();
        let index = NeighborhoodIndex::new(pipeline.params()).unwrap();
        let source = WindowSource::from_records(records(), pipeline.params());
        let (mut index, report) = pipeline.index_into(source, index).unwrap();
        assert_eq!(report.progress.instances_read, 3);
        assert_eq!(report.progress.signatures_produced, 3);
        assert!(report.progress.is_settled());
        assert_eq!(index.len(), 3);
        assert_eq!(index.compute_neighborhood(1).unwrap(), vec![1, 3]);
    }

    #[test]
    fn matches_sequential_signing() {
        let pipeline = SignaturePipeline::new(&params(2)).unwrap();
        let index = NeighborhoodIndex::new(pipeline.params()).unwrap();
        let source = WindowSource::from_records(records(), pipeline.params());
        let (index, _) = pipeline.index_into(source, index).unwrap();
        let expected = pipeline.sign(b"GGGGGGGGGGGGGGGG");
        assert_eq!(index.compute_hash_signature(2).unwrap(), &expected);
    }

    #[test]
    fn empty_input_is_no_instances() {
        let pipeline = SignaturePipeline::new(&params(2)).unwrap();
        let source = WindowSource::from_records(Vec::new(), pipeline.params());
        let index = NeighborhoodIndex::new(pipeline.params()).unwrap();
        assert!(matches!(
            pipeline.index_into(source, index),
            Err(IndexError::NoInstances)
        ));
    }

    #[test]
    fn reader_error_propagates() {
        let pipeline = SignaturePipeline::new(&params(4)).unwrap();
        let index = NeighborhoodIndex::new(pipeline.params()).unwrap();
        assert!(matches!(
            pipeline.index_into(Failing, index),
            Err(IndexError::InputFormat(_))
        ));
    }

    #[test]
    fn sink_panic_becomes_pipeline_error() {
        let pipeline = SignaturePipeline::new(&params(2)).unwrap();
        let source = WindowSource::from_records(records(), pipeline.params());
        let result = pipeline.run(source, &mut Panicking);
        assert!(matches!(result, Err(IndexError::Pipeline(_))));
    }

    #[test]
    fn invalid_params_fail_fast() {
        let bad = Params {
            min_distance: 9,
            ..params(1)
        };
        assert!(matches!(
            SignaturePipeline::new(&bad),
            Err(IndexError::InvalidConfig(_))
        ));
    }
}
