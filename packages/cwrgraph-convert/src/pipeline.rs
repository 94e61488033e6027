//! Concurrent encode/store pipeline
//!
//! ```text
//! reader ─▶ dispatcher ─(jobs)─▶ N workers ─(results)─▶ collector
//! ```
//!
//! Every job carries a sequence index; the collector restores line order
//! from it, never from arrival order. The job queue closing is the only
//! stop signal workers get, and the result queue closes once the dispatcher
//! and every worker have dropped their senders.

use crate::error::{ConvertError, Result};
use crate::record::Record;
use cwrgraph_storage::{MetaObject, ObjectStore};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Parsed line awaiting encoding
#[derive(Debug)]
pub(crate) struct RecordJob {
    pub record: Record,
    pub index: usize,
}

/// Stored object tagged with its sequence index
#[derive(Debug, Clone)]
pub struct IndexedObject {
    pub index: usize,
    pub object: MetaObject,
}

pub(crate) type ObjectResult = Result<IndexedObject>;

/// Dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Jobs sent; sequence indices are exactly `0..dispatched`
    pub dispatched: usize,
    /// Lines without a supported record tag
    pub skipped: usize,
}

/// Read lines in order, dispatching one job per recognized record.
///
/// Lines are raw bytes split on `\n` with a trailing `\r` removed; encoding
/// problems never stop dispatch. Read failures go onto the result queue and
/// stop dispatch. `jobs` is dropped on return, which closes the queue for
/// the workers.
pub(crate) async fn dispatch_lines<R>(
    reader: R,
    jobs: mpsc::Sender<RecordJob>,
    results: mpsc::Sender<ObjectResult>,
) -> DispatchStats
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).split(b'\n');
    let mut stats = DispatchStats::default();
    let mut line_no = 0;

    loop {
        line_no += 1;
        let mut line = match lines.next_segment().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(source) => {
                let _ = results
                    .send(Err(ConvertError::MalformedInput {
                        line: line_no,
                        source,
                    }))
                    .await;
                break;
            }
        };
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        let Some(record) = Record::parse(&line) else {
            stats.skipped += 1;
            continue;
        };

        let job = RecordJob {
            record,
            index: stats.dispatched,
        };
        if jobs.send(job).await.is_err() {
            // Every worker has exited; their errors are already queued
            warn!(
                "Job queue closed after {} jobs; stopping dispatch",
                stats.dispatched
            );
            break;
        }
        stats.dispatched += 1;
    }

    debug!(
        "Dispatcher finished: {} dispatched, {} skipped",
        stats.dispatched, stats.skipped
    );
    stats
}

/// Encode one record and persist it
pub(crate) async fn encode_and_store(
    job: RecordJob,
    store: &dyn ObjectStore,
) -> Result<IndexedObject> {
    let object = MetaObject::encode(&job.record).map_err(|source| ConvertError::Encode {
        index: job.index,
        source,
    })?;
    store.put(&object).await?;
    Ok(IndexedObject {
        index: job.index,
        object,
    })
}

/// Drain the shared job queue until it closes or this worker fails.
async fn run_worker(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<RecordJob>>>,
    results: mpsc::Sender<ObjectResult>,
    store: Arc<dyn ObjectStore>,
) {
    debug!("Worker {} started", worker_id);
    let mut processed = 0usize;

    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else { break };

        let index = job.index;
        match encode_and_store(job, store.as_ref()).await {
            Ok(indexed) => {
                if results.send(Ok(indexed)).await.is_err() {
                    break;
                }
                processed += 1;
            }
            Err(e) => {
                warn!("Worker {} failed on record {}: {}", worker_id, index, e);
                let _ = results.send(Err(e)).await;
                break;
            }
        }
    }

    debug!("Worker {} stopped after {} records", worker_id, processed);
}

/// Fixed pool of encode/store workers sharing one job queue
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn spawn(
        workers: usize,
        jobs: mpsc::Receiver<RecordJob>,
        results: &mpsc::Sender<ObjectResult>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let jobs = Arc::new(Mutex::new(jobs));
        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    jobs.clone(),
                    results.clone(),
                    store.clone(),
                ))
            })
            .collect();
        Self { handles }
    }

    /// Wait for every worker; a panic becomes `WorkerPanicked`
    pub(crate) async fn join(self) -> Result<()> {
        let mut first_panic = None;
        for joined in futures::future::join_all(self.handles).await {
            if let Err(join_err) = joined {
                first_panic.get_or_insert(join_err);
            }
        }
        match first_panic {
            Some(join_err) => Err(ConvertError::WorkerPanicked(join_err.to_string())),
            None => Ok(()),
        }
    }
}

/// Order-restoring result sink
///
/// Slots are addressed by sequence index. The first error observed is kept;
/// later ones are dropped, but draining continues so no worker blocks on a
/// full result queue.
#[derive(Debug, Default)]
pub struct ResultCollector {
    slots: Vec<Option<MetaObject>>,
    first_error: Option<ConvertError>,
    received: usize,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn accept(&mut self, result: Result<IndexedObject>) {
        let indexed = match result {
            Ok(indexed) => indexed,
            Err(e) => {
                if self.first_error.is_none() {
                    self.first_error = Some(e);
                } else {
                    debug!("Discarding subsequent pipeline error: {}", e);
                }
                return;
            }
        };

        let IndexedObject { index, object } = indexed;
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        if self.slots[index].replace(object).is_some() && self.first_error.is_none() {
            self.first_error = Some(ConvertError::DuplicateIndex(index));
        }
        self.received += 1;
    }

    pub(crate) async fn drain(mut self, mut results: mpsc::Receiver<ObjectResult>) -> Self {
        while let Some(result) = results.recv().await {
            self.accept(result);
        }
        self
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Objects in sequence order, or the retained error
    ///
    /// Slots must be dense over `0..dispatched`; a gap means a result was
    /// lost and is reported as `MissingIndex`.
    pub fn finish(self, dispatched: usize) -> Result<Vec<MetaObject>> {
        if let Some(e) = self.first_error {
            return Err(e);
        }
        if self.slots.len() > dispatched {
            return Err(ConvertError::UnexpectedIndex {
                index: self.slots.len() - 1,
                dispatched,
            });
        }

        let mut objects = Vec::with_capacity(dispatched);
        let mut slots = self.slots.into_iter();
        for index in 0..dispatched {
            match slots.next().flatten() {
                Some(object) => objects.push(object),
                None => return Err(ConvertError::MissingIndex { index, dispatched }),
            }
        }
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwrgraph_storage::MemoryObjectStore;
    use serde_json::json;

    fn indexed(index: usize) -> IndexedObject {
        IndexedObject {
            index,
            object: MetaObject::encode(&json!({"record_type": "SPU", "n": index})).unwrap(),
        }
    }

    async fn run_dispatch(input: &'static [u8]) -> (DispatchStats, Vec<RecordJob>) {
        let (job_tx, mut job_rx) = mpsc::channel(256);
        let (result_tx, _result_rx) = mpsc::channel(4);
        let stats = dispatch_lines(input, job_tx, result_tx).await;

        let mut jobs = Vec::new();
        while let Some(job) = job_rx.recv().await {
            jobs.push(job);
        }
        (stats, jobs)
    }

    #[tokio::test]
    async fn test_dispatch_skips_unknown_without_consuming_index() {
        let input = b"HDRPB000001\nXXXignored\nGRHNWR00001\r\nSWR0000\nGRT00001\n";
        let (stats, jobs) = run_dispatch(input).await;

        assert_eq!(stats.dispatched, 3);
        assert_eq!(stats.skipped, 2);
        let indices: Vec<_> = jobs.iter().map(|j| j.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(jobs[1].record.tag().as_str(), "GRH");
    }

    #[tokio::test]
    async fn test_dispatch_empty_input_closes_queue() {
        let (stats, jobs) = run_dispatch(b"").await;
        assert_eq!(stats, DispatchStats::default());
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_accepts_non_utf8_bytes() {
        let input: &'static [u8] = b"HDRPB000001\nGRH\xc9\xfe\r\nNWR000000007\xc9\nTRL\n";
        let (stats, jobs) = run_dispatch(input).await;

        assert_eq!(stats.dispatched, 4);
        assert_eq!(stats.skipped, 0);
        let Record::NewWork(work) = &jobs[2].record else {
            panic!("expected NWR record");
        };
        assert_eq!(work.transaction_sequence, "000000007");
    }

    #[tokio::test]
    async fn test_dispatch_reports_read_error() {
        let input = tokio_test::io::Builder::new()
            .read(b"HDRPB000001\nGRHNWR00001\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))
            .build();
        let (job_tx, mut job_rx) = mpsc::channel(16);
        let (result_tx, mut result_rx) = mpsc::channel(4);

        let stats = dispatch_lines(input, job_tx, result_tx).await;
        assert_eq!(stats.dispatched, 2);

        let err = result_rx.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput { line: 3, .. }));
        assert!(result_rx.recv().await.is_none());

        assert!(job_rx.recv().await.is_some());
        assert!(job_rx.recv().await.is_some());
        assert!(job_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_stops_when_workers_gone() {
        let (job_tx, job_rx) = mpsc::channel(1);
        let (result_tx, _result_rx) = mpsc::channel(4);
        drop(job_rx);

        let stats = dispatch_lines(&b"HDR\nTRL\n"[..], job_tx, result_tx).await;
        assert_eq!(stats.dispatched, 0);
    }

    #[tokio::test]
    async fn test_encode_and_store() {
        let store = MemoryObjectStore::new();
        let job = RecordJob {
            record: Record::parse("GRT00001").unwrap(),
            index: 5,
        };

        let indexed = encode_and_store(job, &store).await.unwrap();
        assert_eq!(indexed.index, 5);
        assert_eq!(indexed.object.get_string("record_type").unwrap(), "GRT");
        assert!(store.contains(indexed.object.id()).await.unwrap());
    }

    #[test]
    fn test_collector_restores_order() {
        let mut collector = ResultCollector::new();
        for i in [3, 0, 2, 1] {
            collector.accept(Ok(indexed(i)));
        }
        assert_eq!(collector.received(), 4);

        let objects = collector.finish(4).unwrap();
        let order: Vec<_> = objects
            .iter()
            .map(|o| o.get_field("n").unwrap().as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_collector_detects_gap() {
        let mut collector = ResultCollector::new();
        collector.accept(Ok(indexed(0)));
        collector.accept(Ok(indexed(2)));

        let err = collector.finish(3).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::MissingIndex {
                index: 1,
                dispatched: 3
            }
        ));
    }

    #[test]
    fn test_collector_detects_missing_tail() {
        let mut collector = ResultCollector::with_capacity(2);
        collector.accept(Ok(indexed(0)));

        assert!(matches!(
            collector.finish(2),
            Err(ConvertError::MissingIndex { index: 1, .. })
        ));
    }

    #[test]
    fn test_collector_detects_index_past_dispatched() {
        let mut collector = ResultCollector::new();
        collector.accept(Ok(indexed(0)));
        collector.accept(Ok(indexed(1)));

        assert!(matches!(
            collector.finish(1),
            Err(ConvertError::UnexpectedIndex {
                index: 1,
                dispatched: 1
            })
        ));
    }

    #[test]
    fn test_collector_detects_duplicate() {
        let mut collector = ResultCollector::new();
        collector.accept(Ok(indexed(0)));
        collector.accept(Ok(indexed(0)));

        assert!(matches!(
            collector.finish(1),
            Err(ConvertError::DuplicateIndex(0))
        ));
    }

    #[test]
    fn test_collector_keeps_first_error() {
        let mut collector = ResultCollector::new();
        collector.accept(Ok(indexed(0)));
        collector.accept(Err(ConvertError::DanglingGroup("first".to_string())));
        collector.accept(Err(ConvertError::DanglingGroup("second".to_string())));
        collector.accept(Ok(indexed(1)));

        match collector.finish(2) {
            Err(ConvertError::DanglingGroup(msg)) => assert_eq!(msg, "first"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_drain_consumes_until_closed() {
        let (tx, rx) = mpsc::channel(2);
        let producer = tokio::spawn(async move {
            for i in (0..10).rev() {
                tx.send(Ok(indexed(i))).await.unwrap();
            }
        });

        let collector = ResultCollector::new().drain(rx).await;
        producer.await.unwrap();

        assert_eq!(collector.received(), 10);
        assert_eq!(collector.finish(10).unwrap().len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_worker_pool_processes_all_jobs() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let (job_tx, job_rx) = mpsc::channel(4);
        let (result_tx, result_rx) = mpsc::channel(4);

        let pool = WorkerPool::spawn(3, job_rx, &result_tx, store.clone());
        drop(result_tx);

        let feeder = tokio::spawn(async move {
            for index in 0..20 {
                let line = format!("SPU{:09}{:07}01", index, index);
                let record = Record::parse(&line).unwrap();
                job_tx.send(RecordJob { record, index }).await.unwrap();
            }
        });

        let collector = ResultCollector::new().drain(result_rx).await;
        feeder.await.unwrap();
        pool.join().await.unwrap();

        let objects = collector.finish(20).unwrap();
        assert_eq!(objects.len(), 20);
        assert_eq!(store.len().await.unwrap(), 20);
        assert_eq!(
            objects[7].get_string("transaction_sequence").unwrap(),
            "000000007"
        );
    }
}
