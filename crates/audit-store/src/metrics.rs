use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the recorder hot path. The backlog gauge makes the
/// fire-and-forget queue observable: a growing backlog means the sink is
/// slower than the request rate.
#[derive(Clone, Default)]
pub struct AuditMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    recorded: AtomicU64,
    dropped: AtomicU64,
    retried: AtomicU64,
    write_errors: AtomicU64,
    backlog: AtomicU64,
}

impl AuditMetrics {
    pub fn record_ok(&self) {
        self.inner.recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.inner.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_error(&self) {
        self.inner.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backlog_inc(&self) {
        self.inner.backlog.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backlog_dec(&self) {
        let _ = self
            .inner
            .backlog
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            recorded: self.inner.recorded.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            retried: self.inner.retried.load(Ordering::Relaxed),
            write_errors: self.inner.write_errors.load(Ordering::Relaxed),
            backlog: self.inner.backlog.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MetricsSnapshot {
    pub recorded: u64,
    pub dropped: u64,
    pub retried: u64,
    pub write_errors: u64,
    pub backlog: u64,
}
