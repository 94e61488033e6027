use crate::config::ConverterConfig;
use crate::error::{ConvertError, Result};
use crate::graph::GraphBuilder;
use crate::pipeline::{dispatch_lines, ResultCollector, WorkerPool};
use cwrgraph_storage::{ContentId, MetaObject, ObjectStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Outcome of one conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    /// Identifier of the root `CwrFile` object
    pub root: ContentId,
    /// Lines that produced a record object
    pub dispatched: usize,
    /// Lines with an unsupported record tag
    pub skipped: usize,
    pub groups: usize,
    pub transactions: usize,
    pub duration_ms: u64,
}

/// Converts CWR text into a content-addressed object graph
pub struct Converter {
    store: Arc<dyn ObjectStore>,
    config: ConverterConfig,
}

impl Converter {
    /// Converter with default configuration
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            config: ConverterConfig::default(),
        }
    }

    pub fn with_config(store: Arc<dyn ObjectStore>, config: ConverterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert a CWR stream and return the root object's identifier
    pub async fn convert<R>(&self, reader: R) -> Result<ContentId>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Ok(self.convert_with_report(reader).await?.root)
    }

    pub async fn convert_file(&self, path: impl AsRef<Path>) -> Result<ContentId> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        self.convert(file).await
    }

    /// Convert a CWR stream, returning counts alongside the root identifier
    ///
    /// Objects written before a failure stay in the store.
    pub async fn convert_with_report<R>(&self, reader: R) -> Result<ConversionReport>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let conversion_id = Uuid::new_v4();
        let span = info_span!("convert", %conversion_id, workers = self.config.workers);

        async move {
            let result = self.run(reader).await;
            if let Err(e) = &result {
                error!("Conversion failed ({}): {}", e.category(), e);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run<R>(&self, reader: R) -> Result<ConversionReport>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let start = Instant::now();
        let capacity = self.config.queue_capacity;

        let (job_tx, job_rx) = mpsc::channel(capacity);
        let (result_tx, result_rx) = mpsc::channel(capacity);

        let pool = WorkerPool::spawn(self.config.workers, job_rx, &result_tx, self.store.clone());
        let dispatcher = tokio::spawn(
            async move { dispatch_lines(reader, job_tx, result_tx).await }.in_current_span(),
        );
        let collector = tokio::spawn(ResultCollector::new().drain(result_rx).in_current_span());

        // Result queue closes only after the dispatcher and all workers exit
        let collector = collector
            .await
            .map_err(|e| ConvertError::WorkerPanicked(format!("collector: {}", e)))?;
        let stats = dispatcher
            .await
            .map_err(|e| ConvertError::WorkerPanicked(format!("dispatcher: {}", e)))?;
        pool.join().await?;

        let objects = collector.finish(stats.dispatched)?;
        let file = GraphBuilder::new(&self.config).build(&objects)?;

        let root = MetaObject::encode(&file).map_err(ConvertError::EncodeRoot)?;
        let root_id = self.store.put(&root).await?;

        let report = ConversionReport {
            root: root_id,
            dispatched: stats.dispatched,
            skipped: stats.skipped,
            groups: file.groups.len(),
            transactions: file.transaction_count(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Converted {} records ({} skipped) into {} groups, {} transactions in {}ms - root {}",
            report.dispatched,
            report.skipped,
            report.groups,
            report.transactions,
            report.duration_ms,
            report.root
        );
        Ok(report)
    }
}
