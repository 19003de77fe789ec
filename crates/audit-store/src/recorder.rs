use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

use crate::api::AuditStore;
use crate::errors::AuditResult;
use crate::metrics::AuditMetrics;
use crate::model::{AuditDraft, AuditEvent};

#[derive(Clone, Debug)]
pub struct RecorderConfig {
    /// Bound of the in-flight queue; excess drafts are dropped and counted.
    pub queue_capacity: usize,
    /// Single retry backoff after a failed append.
    pub retry_backoff: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_024,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

enum Command {
    Record(AuditDraft),
    Flush(oneshot::Sender<()>),
}

/// Non-blocking front of the audit trail.
///
/// `record` enqueues and returns immediately; a background worker drains
/// the queue into the store with one bounded retry. Failures are counted
/// and logged to the operational channel — they never reach the caller,
/// which is the availability-over-durability tradeoff the guarded
/// operations rely on.
#[derive(Clone)]
pub struct AuditRecorder {
    tx: mpsc::Sender<Command>,
    store: Arc<dyn AuditStore>,
    metrics: AuditMetrics,
}

impl AuditRecorder {
    pub fn spawn(store: Arc<dyn AuditStore>, config: RecorderConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<Command>(config.queue_capacity);
        let metrics = AuditMetrics::default();

        let worker_store = Arc::clone(&store);
        let worker_metrics = metrics.clone();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Record(draft) => {
                        append_with_retry(&worker_store, &worker_metrics, draft, &config).await;
                        worker_metrics.backlog_dec();
                    }
                    Command::Flush(reply) => {
                        let _ = reply.send(());
                    }
                }
            }
        });

        Self { tx, store, metrics }
    }

    /// Fire-and-forget path used by response wrappers and business
    /// operations. Never blocks, never errors; a full queue drops the
    /// draft and bumps the drop counter.
    pub fn record(&self, draft: AuditDraft) {
        self.metrics.backlog_inc();
        if let Err(err) = self.tx.try_send(Command::Record(draft)) {
            self.metrics.backlog_dec();
            self.metrics.record_drop();
            warn!(target: "audit", %err, "audit queue full, dropping event");
        }
    }

    /// Synchronous path for denial entries: the event is durable in the
    /// store before the caller sends its rejection. Still infallible from
    /// the caller's point of view.
    pub async fn record_now(&self, draft: AuditDraft) -> Option<AuditEvent> {
        let action = draft.action.clone();
        match self.store.append(draft).await {
            Ok(event) => {
                self.metrics.record_ok();
                Some(event)
            }
            Err(err) => {
                self.metrics.record_write_error();
                error!(target: "audit", %err, action, "failed to record audit event");
                None
            }
        }
    }

    /// Waits until every draft enqueued before the call has been handled.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub fn metrics(&self) -> AuditMetrics {
        self.metrics.clone()
    }

    pub fn store(&self) -> Arc<dyn AuditStore> {
        Arc::clone(&self.store)
    }
}

async fn append_with_retry(
    store: &Arc<dyn AuditStore>,
    metrics: &AuditMetrics,
    draft: AuditDraft,
    config: &RecorderConfig,
) {
    let first: AuditResult<AuditEvent> = store.append(draft.clone()).await;
    if first.is_ok() {
        metrics.record_ok();
        return;
    }

    metrics.record_retry();
    tokio::time::sleep(config.retry_backoff).await;
    match store.append(draft).await {
        Ok(_) => metrics.record_ok(),
        Err(err) => {
            metrics.record_write_error();
            error!(target: "audit", %err, "audit append failed after retry, event lost");
        }
    }
}
