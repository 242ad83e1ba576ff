use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        operator: &'static str,
        input_rows: usize,
    },
    ThrottleWaited {
        duration: Duration,
    },
    ChunkStarted {
        start_row: usize,
        row_count: usize,
    },
    ChunkFinished {
        start_row: usize,
        output_rows: usize,
    },
    RunFinished {
        operator: &'static str,
        output_rows: usize,
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
    RunFailed {
        operator: &'static str,
        message: String,
        elapsed: Duration,
    },
}

/// Observer hook for execution events.
///
/// Chunk events arrive from worker threads, possibly concurrently.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Forwards execution events to `tracing`: runs at `info`, failures at `warn`, throttling at
/// `debug` and chunks at `trace`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted {
                operator,
                input_rows,
            } => info!(operator, input_rows, "run started"),
            ExecutionEvent::ThrottleWaited { duration } => {
                debug!(wait = ?duration, "chunk throttled")
            }
            ExecutionEvent::ChunkStarted {
                start_row,
                row_count,
            } => trace!(start_row, row_count, "chunk started"),
            ExecutionEvent::ChunkFinished {
                start_row,
                output_rows,
            } => trace!(start_row, output_rows, "chunk finished"),
            ExecutionEvent::RunFinished {
                operator,
                output_rows,
                elapsed,
                metrics,
            } => info!(operator, output_rows, ?elapsed, %metrics, "run finished"),
            ExecutionEvent::RunFailed {
                operator,
                message,
                elapsed,
            } => warn!(operator, ?elapsed, error = %message, "run failed"),
        }
    }
}

/// Fans every event out to several observers, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ExecutionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn ExecutionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ExecutionObserver for CompositeObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }
}

/// Real-time metrics for an execution run.
///
/// The engine updates these counters during execution; callers can snapshot them at any time.
/// Counters are reset when a run starts, so a snapshot describes the latest run.
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    rows_processed: AtomicU64,
    chunks_started: AtomicU64,
    chunks_finished: AtomicU64,
    throttle_wait_ns: AtomicU64,
    runs_failed: AtomicU64,

    active_chunks: AtomicUsize,
    max_active_chunks: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            rows_processed: AtomicU64::new(0),
            chunks_started: AtomicU64::new(0),
            chunks_finished: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            active_chunks: AtomicUsize::new(0),
            max_active_chunks: AtomicUsize::new(0),
        }
    }

    pub(crate) fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.rows_processed.store(0, Ordering::SeqCst);
        self.chunks_started.store(0, Ordering::SeqCst);
        self.chunks_finished.store(0, Ordering::SeqCst);
        self.throttle_wait_ns.store(0, Ordering::SeqCst);
        self.active_chunks.store(0, Ordering::SeqCst);
        self.max_active_chunks.store(0, Ordering::SeqCst);
    }

    pub(crate) fn end_run(&self, elapsed: Duration, failed: bool) {
        self.elapsed_ns.store(saturating_nanos(elapsed), Ordering::SeqCst);
        if failed {
            let _ = self.runs_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn on_rows_processed(&self, n: usize) {
        let _ = self.rows_processed.fetch_add(n as u64, Ordering::SeqCst);
    }

    pub(crate) fn on_chunk_start(&self) {
        let _ = self.chunks_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
    }

    pub(crate) fn on_chunk_end(&self) {
        let _ = self.chunks_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_chunks.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn on_throttle_wait(&self, d: Duration) {
        let _ = self
            .throttle_wait_ns
            .fetch_add(saturating_nanos(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns));

        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            rows_processed: self.rows_processed.load(Ordering::SeqCst),
            chunks_started: self.chunks_started.load(Ordering::SeqCst),
            chunks_finished: self.chunks_finished.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_chunks: self.max_active_chunks.load(Ordering::SeqCst),
            runs_failed: self.runs_failed.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub rows_processed: u64,
    pub chunks_started: u64,
    pub chunks_finished: u64,
    pub throttle_wait: Duration,
    pub max_active_chunks: usize,
    /// Failed runs over the engine's lifetime; not reset per run.
    pub runs_failed: u64,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, rows_processed={}, chunks={}/{}, max_active_chunks={}, throttle_wait={:?}, elapsed={:?}, runs_failed={}",
            self.run_id,
            self.rows_processed,
            self.chunks_finished,
            self.chunks_started,
            self.max_active_chunks,
            self.throttle_wait,
            self.elapsed,
            self.runs_failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{CompositeObserver, ExecutionEvent, ExecutionMetrics, ExecutionObserver};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl ExecutionObserver for Counter {
        fn on_event(&self, _event: &ExecutionEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn composite_fans_out_to_every_observer() {
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        let observers: Vec<Arc<dyn ExecutionObserver>> = vec![a.clone(), b.clone()];
        let composite = CompositeObserver::new(observers);
        composite.on_event(&ExecutionEvent::ThrottleWaited {
            duration: Duration::from_millis(1),
        });
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn metrics_reset_per_run_except_failures() {
        let m = ExecutionMetrics::new();
        m.begin_run();
        m.on_chunk_start();
        m.on_rows_processed(10);
        m.on_chunk_end();
        m.end_run(Duration::from_millis(3), true);
        let first = m.snapshot();
        assert_eq!(first.run_id, 1);
        assert_eq!(first.rows_processed, 10);
        assert_eq!(first.max_active_chunks, 1);
        assert_eq!(first.runs_failed, 1);

        m.begin_run();
        let second = m.snapshot();
        assert_eq!(second.run_id, 2);
        assert_eq!(second.rows_processed, 0);
        assert_eq!(second.elapsed, None);
        assert_eq!(second.runs_failed, 1);
    }
}
