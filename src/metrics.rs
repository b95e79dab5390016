// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for country-service.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `country_service_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: country, countries, images
//! - `operation`: get, set, set_many, bulk_insert, ...
//! - `status` / `outcome`: success, error, hit, miss, stale

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

// ═══════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════

/// Record a cache lookup outcome (hit, miss, stale, error)
pub fn record_cache_lookup(kind: &str, outcome: &str) {
    counter!(
        "country_service_cache_lookups_total",
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a cache write
pub fn record_cache_write(status: &str, count: usize) {
    counter!(
        "country_service_cache_writes_total",
        "status" => status.to_string()
    )
    .increment(count as u64);
}

/// Record an absorbed cache transport error
pub fn record_cache_error(operation: &str) {
    counter!(
        "country_service_cache_errors_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record entries dropped by the in-process cache (expired, capacity)
pub fn record_cache_eviction(reason: &str, count: usize) {
    counter!(
        "country_service_cache_evictions_total",
        "reason" => reason.to_string()
    )
    .increment(count as u64);
}

// ═══════════════════════════════════════════════════════════════════════════
// STORE
// ═══════════════════════════════════════════════════════════════════════════

/// Record a store operation
pub fn record_store_operation(operation: &str, status: &str) {
    counter!(
        "country_service_store_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record store operation latency
pub fn record_store_latency(operation: &str, duration: Duration) {
    histogram!(
        "country_service_store_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set backend health status (1 = healthy, 0 = unhealthy)
pub fn set_backend_healthy(backend: &str, healthy: bool) {
    gauge!(
        "country_service_backend_healthy",
        "backend" => backend.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

// ═══════════════════════════════════════════════════════════════════════════
// INGESTION
// ═══════════════════════════════════════════════════════════════════════════

/// Record one reconciliation decision (new, updated, unchanged)
pub fn record_decision(decision: &str) {
    counter!(
        "country_service_reconcile_decisions_total",
        "decision" => decision.to_string()
    )
    .increment(1);
}

/// Record the end of an ingestion run
pub fn record_ingest_run(status: &str, duration: Duration) {
    counter!(
        "country_service_ingest_runs_total",
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("country_service_ingest_run_seconds").record(duration.as_secs_f64());
}

/// Record the size of a fetched upstream batch
pub fn record_batch_size(count: usize) {
    histogram!("country_service_ingest_batch_size").record(count as f64);
}

/// Record startup phase duration
pub fn record_startup_phase(phase: &str, duration: Duration) {
    histogram!(
        "country_service_startup_seconds",
        "phase" => phase.to_string()
    )
    .record(duration.as_secs_f64());
}

/// A timing guard that records store latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_store_latency(self.operation, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These only check that recording without an installed recorder is a no-op.

    #[test]
    fn test_cache_metrics() {
        record_cache_lookup("country", "hit");
        record_cache_lookup("countries", "miss");
        record_cache_write("success", 3);
        record_cache_error("get");
        record_cache_eviction("capacity", 1);
    }

    #[test]
    fn test_store_metrics() {
        record_store_operation("bulk_insert", "success");
        record_store_latency("get_country", Duration::from_millis(2));
        set_backend_healthy("sql", true);
    }

    #[test]
    fn test_ingest_metrics() {
        record_decision("new");
        record_decision("unchanged");
        record_batch_size(250);
        record_ingest_run("success", Duration::from_secs(1));
        record_startup_phase("store_connect", Duration::from_millis(40));
    }

    #[test]
    fn test_latency_timer() {
        {
            let _timer = LatencyTimer::new("get_country");
            std::thread::sleep(Duration::from_micros(10));
        }
    }
}
