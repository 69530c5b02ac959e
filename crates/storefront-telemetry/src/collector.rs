//! In-process call statistics.
//!
//! [`TelemetryCollector`] aggregates per-call outcomes into a
//! [`TelemetrySnapshot`] and hands snapshots to a host callback, either on
//! demand ([`TelemetryCollector::flush`]) or from a background interval.
//!
//! The interval task holds only a weak reference: dropping the last `Arc`
//! ends it, and it never keeps anything alive on its own.

use crate::config::TelemetryConfig;
use crate::metrics::{self, Outcome};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Callback receiving flushed snapshots.
pub type FlushCallback = Arc<dyn Fn(TelemetrySnapshot) + Send + Sync>;

/// Aggregated statistics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// Settled calls.
    pub total_requests: u64,
    /// Calls that succeeded.
    pub success_count: u64,
    /// Calls that failed (timeouts included).
    pub error_count: u64,
    /// Calls that failed by timing out.
    pub timeout_count: u64,
    /// Retry attempts.
    pub retry_count: u64,
    /// Mean duration in milliseconds, 0 when empty.
    pub avg_duration_ms: f64,
    /// Nearest-rank 95th percentile duration in milliseconds, 0 when empty.
    pub p95_duration_ms: f64,
}

#[derive(Debug, Default)]
struct Stats {
    total_requests: u64,
    success_count: u64,
    error_count: u64,
    timeout_count: u64,
    retry_count: u64,
    durations_ms: Vec<f64>,
}

impl Stats {
    fn snapshot(&self) -> TelemetrySnapshot {
        let n = self.durations_ms.len();
        let (avg, p95) = if n == 0 {
            (0.0, 0.0)
        } else {
            let avg = self.durations_ms.iter().sum::<f64>() / n as f64;
            let mut sorted = self.durations_ms.clone();
            sorted.sort_by(f64::total_cmp);
            let rank = (0.95 * n as f64).ceil() as usize;
            (avg, sorted[rank.saturating_sub(1).min(n - 1)])
        };

        TelemetrySnapshot {
            total_requests: self.total_requests,
            success_count: self.success_count,
            error_count: self.error_count,
            timeout_count: self.timeout_count,
            retry_count: self.retry_count,
            avg_duration_ms: avg,
            p95_duration_ms: p95,
        }
    }
}

/// Collects call outcomes and flushes snapshots.
///
/// # Example
///
/// ```
/// use storefront_telemetry::TelemetryCollector;
/// use std::time::Duration;
///
/// let collector = TelemetryCollector::builder().build();
/// collector.record_success(Duration::from_millis(100));
/// collector.record_success(Duration::from_millis(200));
///
/// let snapshot = collector.snapshot();
/// assert_eq!(snapshot.total_requests, 2);
/// assert!((snapshot.avg_duration_ms - 150.0).abs() < 1e-9);
/// ```
pub struct TelemetryCollector {
    stats: Mutex<Stats>,
    on_flush: Option<FlushCallback>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TelemetryCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryCollector")
            .field("stats", &*self.stats.lock())
            .field("on_flush", &self.on_flush.is_some())
            .field("flush_task", &self.flush_task.lock().is_some())
            .finish()
    }
}

impl TelemetryCollector {
    /// Creates a new collector builder.
    #[must_use]
    pub fn builder() -> TelemetryCollectorBuilder {
        TelemetryCollectorBuilder::default()
    }

    /// Creates a collector from configuration and an optional callback.
    #[must_use]
    pub fn from_config(config: &TelemetryConfig, on_flush: Option<FlushCallback>) -> Arc<Self> {
        let mut builder = Self::builder();
        if let Some(interval) = config.flush_interval {
            builder = builder.flush_interval(interval);
        }
        if let Some(callback) = on_flush {
            builder.on_flush = Some(callback);
        }
        builder.build()
    }

    /// Records a successful call.
    pub fn record_success(&self, duration: Duration) {
        {
            let mut stats = self.stats.lock();
            stats.total_requests += 1;
            stats.success_count += 1;
            stats.durations_ms.push(duration.as_secs_f64() * 1000.0);
        }
        metrics::record_request(Outcome::Success, duration);
    }

    /// Records a failed call.
    pub fn record_error(&self, duration: Duration, is_timeout: bool) {
        {
            let mut stats = self.stats.lock();
            stats.total_requests += 1;
            stats.error_count += 1;
            if is_timeout {
                stats.timeout_count += 1;
            }
            stats.durations_ms.push(duration.as_secs_f64() * 1000.0);
        }
        let outcome = if is_timeout {
            Outcome::Timeout
        } else {
            Outcome::Error
        };
        metrics::record_request(outcome, duration);
    }

    /// Records one retry attempt.
    pub fn record_retry(&self) {
        self.stats.lock().retry_count += 1;
        metrics::record_retry();
    }

    /// Returns the current statistics.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.stats.lock().snapshot()
    }

    /// Hands the current snapshot to the flush callback, if one is set.
    pub fn flush(&self) {
        if let Some(callback) = &self.on_flush {
            let snapshot = self.snapshot();
            tracing::trace!(total = snapshot.total_requests, "flushing telemetry");
            callback(snapshot);
        }
    }

    /// Zeroes all statistics. The flush timer is left running.
    pub fn reset(&self) {
        *self.stats.lock() = Stats::default();
    }

    /// Stops the background flush, if running.
    pub fn destroy(&self) {
        if let Some(task) = self.flush_task.lock().take() {
            task.abort();
        }
    }

    /// Returns `true` while the background flush is scheduled.
    #[must_use]
    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn start_flush_task(self: &Arc<Self>, interval: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no tokio runtime; periodic telemetry flush disabled");
            return;
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        let task = runtime.spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                let Some(collector) = weak.upgrade() else {
                    break;
                };
                collector.flush();
            }
        });
        *self.flush_task.lock() = Some(task);
    }
}

impl Drop for TelemetryCollector {
    fn drop(&mut self) {
        if let Some(task) = self.flush_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Builder for [`TelemetryCollector`].
#[derive(Default)]
pub struct TelemetryCollectorBuilder {
    flush_interval: Option<Duration>,
    on_flush: Option<FlushCallback>,
}

impl TelemetryCollectorBuilder {
    /// Sets the background flush interval.
    #[must_use]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Sets the callback that receives flushed snapshots.
    #[must_use]
    pub fn on_flush<F>(mut self, callback: F) -> Self
    where
        F: Fn(TelemetrySnapshot) + Send + Sync + 'static,
    {
        self.on_flush = Some(Arc::new(callback));
        self
    }

    /// Builds the collector.
    ///
    /// The background flush starts only with a positive interval, a
    /// callback, and a running tokio runtime.
    #[must_use]
    pub fn build(self) -> Arc<TelemetryCollector> {
        let collector = Arc::new(TelemetryCollector {
            stats: Mutex::new(Stats::default()),
            on_flush: self.on_flush,
            flush_task: Mutex::new(None),
        });

        if let Some(interval) = self.flush_interval.filter(|d| !d.is_zero()) {
            if collector.on_flush.is_some() {
                collector.start_flush_task(interval);
            }
        }
        collector
    }
}
