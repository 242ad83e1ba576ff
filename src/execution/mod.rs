//! Execution engine for running transformations with configurable parallelism.
//!
//! This module sits "above" [`crate::processing`] and provides:
//!
//! - Parallel (chunked) row evaluation for `filter`, `case_when` and `coalesce`
//! - Resource limits / throttling (in-flight chunks)
//! - Real-time metrics + observer hooks for monitoring, also around sequential operators via
//!   [`ExecutionEngine::run`]
//!
//! Parallel results are identical to the sequential operators', rows in the same order.

mod observer;
mod semaphore;

use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};
use crate::processing::coalesce::CoalescePlan;
use crate::processing::CaseWhen;
use crate::table::{Column, Row, Table};
use crate::types::Value;

pub use observer::{
    CompositeObserver, ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot,
    ExecutionObserver, TracingObserver,
};

use semaphore::Semaphore;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Number of rows per chunk.
    pub chunk_size: usize,
    /// Upper bound on concurrently executing chunks, on top of `num_threads`.
    pub max_in_flight_chunks: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = available_threads();
        Self {
            num_threads: Some(n),
            chunk_size: 4_096,
            max_in_flight_chunks: n,
        }
    }
}

impl ExecutionOptions {
    fn validate(&self) -> TransformResult<()> {
        const OP: &str = "execution";
        if self.chunk_size == 0 {
            return Err(TransformError::invalid_value(OP, "chunk_size must be > 0"));
        }
        if self.max_in_flight_chunks == 0 {
            return Err(TransformError::invalid_value(
                OP,
                "max_in_flight_chunks must be > 0",
            ));
        }
        if self.num_threads == Some(0) {
            return Err(TransformError::invalid_value(
                OP,
                "num_threads must be > 0 when set",
            ));
        }
        Ok(())
    }
}

fn available_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// A configurable execution engine for [`Table`] transformations.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// Zero `chunk_size`, `max_in_flight_chunks` or `num_threads` is rejected as an invalid
    /// value; a thread pool that cannot be started is reported as [`TransformError::ThreadPool`].
    pub fn new(opts: ExecutionOptions) -> TransformResult<Self> {
        opts.validate()?;
        let n_threads = opts.num_threads.unwrap_or_else(available_threads);
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("tabular-worker-{i}"))
            .build()?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.opts
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Parallel [`crate::processing::filter()`].
    pub fn filter_parallel<F>(&self, table: &Table, predicate: F) -> Table
    where
        F: Fn(&Row<'_>) -> bool + Send + Sync,
    {
        let start = self.begin("filter", table);
        let keep = self.evaluate_rows(table, &predicate);
        let indices: Vec<usize> = keep
            .into_iter()
            .enumerate()
            .filter_map(|(i, k)| k.then_some(i))
            .collect();
        let out = table.take_rows(&indices);
        self.finish("filter", start, &Ok(&out));
        out
    }

    /// Parallel [`crate::processing::case_when()`].
    pub fn case_when_parallel(
        &self,
        table: &Table,
        cases: &CaseWhen,
        target: &str,
    ) -> TransformResult<Table> {
        const OP: &str = "case_when";
        let start = self.begin(OP, table);
        let out = cases.resolve(target).and_then(|resolved| {
            let values = self.evaluate_rows(table, &|row: &Row<'_>| resolved.evaluate(row));
            table.with_column(OP, target, Column::from_parts(resolved.output_type(), values))
        });
        self.finish(OP, start, &out.as_ref());
        out
    }

    /// Parallel [`crate::processing::coalesce_or()`]; pass [`Value::Null`] as `default` for plain
    /// [`crate::processing::coalesce()`].
    pub fn coalesce_parallel(
        &self,
        table: &Table,
        target: &str,
        sources: &[&str],
        default: Value,
    ) -> TransformResult<Table> {
        const OP: &str = "coalesce";
        let start = self.begin(OP, table);
        let out = CoalescePlan::new(table, sources, default).and_then(|plan| {
            let values = self.evaluate_rows(table, &|row: &Row<'_>| plan.evaluate(row));
            table.with_column(OP, target, Column::from_parts(plan.output_type(), values))
        });
        self.finish(OP, start, &out.as_ref());
        out
    }

    /// Run any sequential operator under the engine's metrics and observer.
    ///
    /// ```rust
    /// use tabular_transforms::execution::{ExecutionEngine, ExecutionOptions};
    /// use tabular_transforms::processing::clean_names;
    /// use tabular_transforms::table::{Column, Table};
    ///
    /// let engine = ExecutionEngine::new(ExecutionOptions::default()).unwrap();
    /// let t = Table::new(vec![("Full Name", Column::utf8([Some("ada")]))]).unwrap();
    /// let out = engine.run("clean_names", &t, clean_names).unwrap();
    /// assert_eq!(out.column_names(), vec!["full_name"]);
    /// ```
    pub fn run<F>(&self, operator: &'static str, table: &Table, f: F) -> TransformResult<Table>
    where
        F: FnOnce(&Table) -> TransformResult<Table>,
    {
        let start = self.begin(operator, table);
        let out = f(table);
        if out.is_ok() {
            self.metrics.on_rows_processed(table.row_count());
        }
        self.finish(operator, start, &out.as_ref());
        out
    }

    fn begin(&self, operator: &'static str, table: &Table) -> Instant {
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted {
            operator,
            input_rows: table.row_count(),
        });
        Instant::now()
    }

    fn finish(
        &self,
        operator: &'static str,
        start: Instant,
        result: &Result<&Table, &TransformError>,
    ) {
        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed, result.is_err());
        match result {
            Ok(out) => self.emit(ExecutionEvent::RunFinished {
                operator,
                output_rows: out.row_count(),
                elapsed,
                metrics: self.metrics.snapshot(),
            }),
            Err(e) => self.emit(ExecutionEvent::RunFailed {
                operator,
                message: e.to_string(),
                elapsed,
            }),
        }
    }

    /// Evaluate `f` on every row, chunked and throttled on the pool. Results are in row order.
    fn evaluate_rows<T, F>(&self, table: &Table, f: &F) -> Vec<T>
    where
        T: Send,
        F: Fn(&Row<'_>) -> T + Sync,
    {
        let sem = Semaphore::new(self.opts.max_in_flight_chunks);
        let ranges = chunk_ranges(table.row_count(), self.opts.chunk_size);

        let per_chunk: Vec<Vec<T>> = self.pool.install(|| {
            ranges
                .into_par_iter()
                .map(|range| {
                    let (_permit, waited) = sem.acquire();
                    if waited > Duration::ZERO {
                        self.metrics.on_throttle_wait(waited);
                        self.emit(ExecutionEvent::ThrottleWaited { duration: waited });
                    }

                    self.metrics.on_chunk_start();
                    self.emit(ExecutionEvent::ChunkStarted {
                        start_row: range.start,
                        row_count: range.len(),
                    });

                    let start_row = range.start;
                    let out: Vec<T> = range
                        .filter_map(|i| table.row(i))
                        .map(|row| f(&row))
                        .collect();

                    self.metrics.on_rows_processed(out.len());
                    self.emit(ExecutionEvent::ChunkFinished {
                        start_row,
                        output_rows: out.len(),
                    });
                    self.metrics.on_chunk_end();
                    out
                })
                .collect()
        });

        per_chunk.into_iter().flatten().collect()
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

fn chunk_ranges(row_count: usize, chunk_size: usize) -> Vec<Range<usize>> {
    (0..row_count)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(row_count))
        .collect()
}
