//! Channel-driven ingestion worker.
//!
//! The worker owns the receiving end of a bounded channel and processes
//! requests one at a time on the blocking pool, so a producer (a directory
//! watcher, a scheduler) only needs an [`IngestHandle`].

use crate::error::{IngestError, IngestResult};
use crate::pipeline::{FileReport, IngestOutcome, IngestionPipeline};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use volest_core::{RawTrade, StockId};

/// Notified after every ingestion that changed stored history.
pub trait IngestObserver: Send + Sync {
    fn on_history_changed(&self, stock: &StockId, date: NaiveDate, outcome: &IngestOutcome);
}

/// Work item for the [`IngestWorker`].
#[derive(Debug)]
pub enum IngestRequest {
    /// Load and ingest one raw file.
    File {
        path: PathBuf,
        reply: Option<oneshot::Sender<IngestResult<FileReport>>>,
    },
    /// Ingest raw trades already in memory.
    Trades {
        stock: StockId,
        date: NaiveDate,
        trades: Vec<RawTrade>,
        reply: Option<oneshot::Sender<IngestResult<IngestOutcome>>>,
    },
    /// Stop after the requests queued before this one.
    Shutdown,
}

/// Consumer side of the ingestion channel.
pub struct IngestWorker {
    rx: mpsc::Receiver<IngestRequest>,
    pipeline: Arc<IngestionPipeline>,
    observer: Option<Arc<dyn IngestObserver>>,
}

impl IngestWorker {
    pub fn new(rx: mpsc::Receiver<IngestRequest>, pipeline: Arc<IngestionPipeline>) -> Self {
        Self {
            rx,
            pipeline,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Process requests until `Shutdown` or until every sender is dropped.
    pub async fn run(mut self) {
        debug!("IngestWorker started");

        while let Some(request) = self.rx.recv().await {
            match request {
                IngestRequest::Shutdown => {
                    debug!("IngestWorker shutting down");
                    break;
                }
                IngestRequest::File { path, reply } => {
                    let pipeline = Arc::clone(&self.pipeline);
                    let observer = self.observer.clone();
                    let result = run_blocking(move || {
                        let report = pipeline.process_file(&path)?;
                        notify(observer.as_deref(), &report.stock, report.date, &report.outcome);
                        Ok(report)
                    })
                    .await;
                    respond(reply, result);
                }
                IngestRequest::Trades {
                    stock,
                    date,
                    trades,
                    reply,
                } => {
                    let pipeline = Arc::clone(&self.pipeline);
                    let observer = self.observer.clone();
                    let result = run_blocking(move || {
                        let (_, outcome) = pipeline.ingest_raw(&stock, date, &trades)?;
                        notify(observer.as_deref(), &stock, date, &outcome);
                        Ok(outcome)
                    })
                    .await;
                    respond(reply, result);
                }
            }
        }

        info!("IngestWorker terminated");
    }
}

/// Runs on the blocking pool with the ingestion, before the reply is sent.
fn notify(
    observer: Option<&dyn IngestObserver>,
    stock: &StockId,
    date: NaiveDate,
    outcome: &IngestOutcome,
) {
    if let Some(observer) = observer {
        if outcome.changed_history() {
            observer.on_history_changed(stock, date, outcome);
        }
    }
}

async fn run_blocking<T, F>(f: F) -> IngestResult<T>
where
    F: FnOnce() -> IngestResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IngestError::Worker(e.to_string()))?
}

fn respond<T>(reply: Option<oneshot::Sender<IngestResult<T>>>, result: IngestResult<T>) {
    match reply {
        Some(tx) => {
            if tx.send(result).is_err() {
                debug!("Ingest requester went away before the reply");
            }
        }
        None => {
            if let Err(e) = result {
                warn!(error = %e, "Ingest request failed");
            }
        }
    }
}

/// Producer side of the ingestion channel.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<IngestRequest>,
}

impl IngestHandle {
    /// Ingest a file and wait for the result.
    pub async fn ingest_file(&self, path: PathBuf) -> IngestResult<FileReport> {
        let (reply, rx) = oneshot::channel();
        self.send(IngestRequest::File {
            path,
            reply: Some(reply),
        })
        .await?;
        rx.await
            .map_err(|_| IngestError::Worker("worker dropped the request".to_string()))?
    }

    /// Ingest in-memory trades and wait for the result.
    pub async fn ingest_trades(
        &self,
        stock: StockId,
        date: NaiveDate,
        trades: Vec<RawTrade>,
    ) -> IngestResult<IngestOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(IngestRequest::Trades {
            stock,
            date,
            trades,
            reply: Some(reply),
        })
        .await?;
        rx.await
            .map_err(|_| IngestError::Worker("worker dropped the request".to_string()))?
    }

    /// Queue a file without waiting for the result.
    pub async fn submit_file(&self, path: PathBuf) -> IngestResult<()> {
        self.send(IngestRequest::File { path, reply: None }).await
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(IngestRequest::Shutdown).await;
    }

    async fn send(&self, request: IngestRequest) -> IngestResult<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| IngestError::Worker("worker channel closed".to_string()))
    }
}

/// Spawn an [`IngestWorker`] on the current runtime.
pub fn spawn_ingest_worker(
    pipeline: Arc<IngestionPipeline>,
    observer: Option<Arc<dyn IngestObserver>>,
    capacity: usize,
) -> (IngestHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let mut worker = IngestWorker::new(rx, pipeline);
    if let Some(observer) = observer {
        worker = worker.with_observer(observer);
    }
    let join_handle = tokio::spawn(worker.run());
    (IngestHandle { tx }, join_handle)
}
