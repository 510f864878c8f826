//! Cache performance metrics.
//!
//! [`CacheMetrics`] keeps request counters and cumulative timings for the
//! cached read path. All counters sit behind one `RwLock`: a record call
//! updates every affected field under the write guard, and a snapshot reads
//! them under the read guard, so a snapshot never sees half an update.
//!
//! There is no global instance. Create one, share it behind an `Arc`, and
//! hand it to whatever records or reports.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;

// ============================================================================
// LABELS
// ============================================================================

/// The four cached read operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    List,
    Get,
    Count,
    Tags,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [Self::List, Self::Get, Self::Count, Self::Tags];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "List",
            Self::Get => "Get",
            Self::Count => "Count",
            Self::Tags => "Tags",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a cached read was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOutcome {
    /// Served from the cache.
    Hit,
    /// Key absent or corrupted; served by the authoritative service.
    Miss,
    /// Cache unreachable or slow; served by the authoritative service.
    Error,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RECORDER
// ============================================================================

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    hits: u64,
    misses: u64,
    errors: u64,
    total_time: Duration,
    hit_time: Duration,
    /// Misses and errors both fell through to the authoritative service.
    fallback_time: Duration,
    list_requests: u64,
    get_requests: u64,
    count_requests: u64,
    tags_requests: u64,
}

impl Counters {
    fn bump_operation(&mut self, op: OperationKind) {
        match op {
            OperationKind::List => self.list_requests += 1,
            OperationKind::Get => self.get_requests += 1,
            OperationKind::Count => self.count_requests += 1,
            OperationKind::Tags => self.tags_requests += 1,
        }
    }
}

/// Concurrency-safe cache metrics recorder.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    counters: RwLock<Counters>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking recorder cannot leave counters half-written: every update
    // is plain arithmetic, so a poisoned lock is still safe to use.
    fn write(&self) -> RwLockWriteGuard<'_, Counters> {
        self.counters.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, Counters> {
        self.counters.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one request with the given outcome.
    pub fn record(&self, outcome: CacheOutcome, op: OperationKind, duration: Duration) {
        let mut c = self.write();
        c.total_requests += 1;
        c.total_time += duration;
        match outcome {
            CacheOutcome::Hit => {
                c.hits += 1;
                c.hit_time += duration;
            }
            CacheOutcome::Miss => {
                c.misses += 1;
                c.fallback_time += duration;
            }
            CacheOutcome::Error => {
                c.errors += 1;
                c.fallback_time += duration;
            }
        }
        c.bump_operation(op);
    }

    pub fn record_hit(&self, op: OperationKind, duration: Duration) {
        self.record(CacheOutcome::Hit, op, duration);
    }

    pub fn record_miss(&self, op: OperationKind, duration: Duration) {
        self.record(CacheOutcome::Miss, op, duration);
    }

    pub fn record_error(&self, op: OperationKind, duration: Duration) {
        self.record(CacheOutcome::Error, op, duration);
    }

    /// Point-in-time copy of all counters with derived averages.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = self.read();

        let hit_ratio = if c.total_requests > 0 {
            c.hits as f64 / c.total_requests as f64 * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            total_requests: c.total_requests,
            hits: c.hits,
            misses: c.misses,
            errors: c.errors,
            hit_ratio,
            avg_response_time: average(c.total_time, c.total_requests),
            avg_hit_time: average(c.hit_time, c.hits),
            avg_fallback_time: average(c.fallback_time, c.misses + c.errors),
            list_requests: c.list_requests,
            get_requests: c.get_requests,
            count_requests: c.count_requests,
            tags_requests: c.tags_requests,
        }
    }

    /// Emit the current snapshot as a structured log record.
    pub fn log_snapshot(&self) {
        self.snapshot().log("Cache performance");
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / count as u128;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Immutable aggregate of [`CacheMetrics`] at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    /// Percentage of requests served from cache (0 when idle).
    pub hit_ratio: f64,
    pub avg_response_time: Duration,
    pub avg_hit_time: Duration,
    /// Average time of requests that fell through to the authoritative service.
    pub avg_fallback_time: Duration,
    pub list_requests: u64,
    pub get_requests: u64,
    pub count_requests: u64,
    pub tags_requests: u64,
}

impl MetricsSnapshot {
    /// Requests recorded for one operation kind.
    pub fn requests_for(&self, op: OperationKind) -> u64 {
        match op {
            OperationKind::List => self.list_requests,
            OperationKind::Get => self.get_requests,
            OperationKind::Count => self.count_requests,
            OperationKind::Tags => self.tags_requests,
        }
    }

    /// Emit this snapshot as an info-level log record.
    pub fn log(&self, message: &'static str) {
        tracing::info!(
            total_requests = self.total_requests,
            cache_hits = self.hits,
            cache_misses = self.misses,
            cache_errors = self.errors,
            hit_ratio_percent = self.hit_ratio,
            avg_response_time_ms = self.avg_response_time.as_secs_f64() * 1000.0,
            avg_hit_time_ms = self.avg_hit_time.as_secs_f64() * 1000.0,
            avg_fallback_time_ms = self.avg_fallback_time.as_secs_f64() * 1000.0,
            list_requests = self.list_requests,
            get_requests = self.get_requests,
            count_requests = self.count_requests,
            tags_requests = self.tags_requests,
            "{}",
            message
        );
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn outcome_strategy() -> impl Strategy<Value = CacheOutcome> {
        prop_oneof![
            Just(CacheOutcome::Hit),
            Just(CacheOutcome::Miss),
            Just(CacheOutcome::Error),
        ]
    }

    fn op_strategy() -> impl Strategy<Value = OperationKind> {
        prop_oneof![
            Just(OperationKind::List),
            Just(OperationKind::Get),
            Just(OperationKind::Count),
            Just(OperationKind::Tags),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: hit ratio is N/(N+M+K)*100 and the average response time
        /// is the mean of every recorded duration.
        #[test]
        fn prop_snapshot_matches_recorded_samples(
            samples in prop::collection::vec((outcome_strategy(), op_strategy(), 0u64..5_000_000), 1..200)
        ) {
            let metrics = CacheMetrics::new();
            for (outcome, op, micros) in &samples {
                metrics.record(*outcome, *op, Duration::from_micros(*micros));
            }

            let s = metrics.snapshot();
            let total = samples.len() as u64;
            let hits = samples.iter().filter(|(o, _, _)| *o == CacheOutcome::Hit).count() as u64;
            let sum_micros: u128 = samples.iter().map(|(_, _, m)| *m as u128).sum();

            prop_assert_eq!(s.total_requests, total);
            prop_assert_eq!(s.hits + s.misses + s.errors, total);
            let expected_ratio = hits as f64 / total as f64 * 100.0;
            prop_assert!((s.hit_ratio - expected_ratio).abs() < 1e-9);

            let expected_avg_nanos = sum_micros * 1000 / total as u128;
            prop_assert_eq!(s.avg_response_time.as_nanos(), expected_avg_nanos);

            let per_op: u64 = OperationKind::ALL.iter().map(|op| s.requests_for(*op)).sum();
            prop_assert_eq!(per_op, total);
        }
    }
}
