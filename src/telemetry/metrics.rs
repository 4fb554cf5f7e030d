// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide counters for tracked calls.
//!
//! Lightweight in-memory metrics: calls and failures per call type, a
//! latency histogram, token totals, and transport failures. Nothing here is
//! exported; callers read a [`MetricsSnapshot`] when they want numbers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<TrackerMetrics> = Lazy::new(TrackerMetrics::new);

/// Central metrics collection.
#[derive(Debug)]
pub struct TrackerMetrics {
    /// Per call type (`generate`, `stream`, `embedding`).
    calls: RwLock<HashMap<String, CallMetrics>>,

    tokens: TokenMetrics,

    transport_failures: AtomicU64,

    start_time: Instant,
}

// A panic while holding the lock leaves plain counters, still usable.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl TrackerMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            calls: RwLock::new(HashMap::new()),
            tokens: TokenMetrics::new(),
            transport_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a tracked call.
    pub fn record_call(&self, call_type: &str, duration: Duration, success: bool) {
        let mut calls = write(&self.calls);
        let metrics = calls.entry(call_type.to_string()).or_default();
        metrics.record(duration, success);
    }

    /// Record token usage.
    pub fn record_tokens(&self, input: u64, output: u64) {
        self.tokens.add_input(input);
        self.tokens.add_output(output);
    }

    /// Record a failed delivery.
    pub fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get metrics for a call type.
    pub fn call_metrics(&self, call_type: &str) -> Option<CallMetrics> {
        read(&self.calls).get(call_type).cloned()
    }

    /// Get total token counts.
    pub fn token_counts(&self) -> (u64, u64) {
        (self.tokens.input_total(), self.tokens.output_total())
    }

    pub fn transport_failures(&self) -> u64 {
        self.transport_failures.load(Ordering::Relaxed)
    }

    /// Get uptime since metrics were initialized.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls: read(&self.calls).clone(),
            input_tokens: self.tokens.input_total(),
            output_tokens: self.tokens.output_total(),
            transport_failures: self.transport_failures(),
            uptime: self.uptime(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        write(&self.calls).clear();
        self.tokens.reset();
        self.transport_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for TrackerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics for one call type.
#[derive(Debug, Clone)]
pub struct CallMetrics {
    pub count: u64,
    pub errors: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl CallMetrics {
    pub fn new() -> Self {
        Self {
            count: 0,
            errors: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    /// Record a call.
    pub fn record(&mut self, duration: Duration, success: bool) {
        self.count += 1;
        if !success {
            self.errors += 1;
        }
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    /// Calculate average duration.
    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }

    /// Fraction of calls that failed (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.errors as f64 / self.count as f64
        }
    }
}

impl Default for CallMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple histogram with fixed buckets for latency tracking.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Bucket boundaries in milliseconds.
    buckets: Vec<u64>,

    /// Count per bucket, plus one overflow bucket.
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in milliseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    /// Record a duration value.
    pub fn record(&mut self, duration: Duration) {
        let millis = duration.as_millis() as u64;
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| millis <= b)
            .unwrap_or(self.buckets.len());
        self.counts[bucket_idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Calculate approximate percentile (p50, p90, p99, etc.).
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let millis = match self.buckets.get(i) {
                    Some(&bound) => bound,
                    None => self.buckets.last().copied().unwrap_or(0) * 10,
                };
                return Duration::from_millis(millis);
            }
        }

        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 100ms, 500ms, 1s, 5s, 10s, 30s, 60s
        Self::with_buckets(vec![100, 500, 1_000, 5_000, 10_000, 30_000, 60_000])
    }
}

/// Thread-safe token usage tracking.
#[derive(Debug)]
struct TokenMetrics {
    input: AtomicU64,
    output: AtomicU64,
}

impl TokenMetrics {
    fn new() -> Self {
        Self {
            input: AtomicU64::new(0),
            output: AtomicU64::new(0),
        }
    }

    fn add_input(&self, count: u64) {
        self.input.fetch_add(count, Ordering::Relaxed);
    }

    fn add_output(&self, count: u64) {
        self.output.fetch_add(count, Ordering::Relaxed);
    }

    fn input_total(&self) -> u64 {
        self.input.load(Ordering::Relaxed)
    }

    fn output_total(&self) -> u64 {
        self.output.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.input.store(0, Ordering::Relaxed);
        self.output.store(0, Ordering::Relaxed);
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub calls: HashMap<String, CallMetrics>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub transport_failures: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== LLM Call Metrics ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "Tokens: {} input, {} output\n",
            self.input_tokens, self.output_tokens
        ));
        report.push_str(&format!("Transport failures: {}\n\n", self.transport_failures));

        let mut names: Vec<_> = self.calls.keys().collect();
        names.sort();
        for name in names {
            let metrics = &self.calls[name];
            report.push_str(&format!(
                "  {}: {} calls, {:.1}% errors, avg {:.2?}, p99 {:.2?}\n",
                name,
                metrics.count,
                metrics.error_rate() * 100.0,
                metrics.avg_duration(),
                metrics.histogram.p99()
            ));
        }

        report
    }
}
