// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fetch → classify → propagate, once or on a schedule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::cache::ReadThroughCache;
use crate::error::IngestError;
use crate::metrics;
use crate::store::CountryStore;
use super::propagator::WritePropagator;
use super::reconciler::Reconciler;
use super::source::CountrySource;

/// Counts from one completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub cache_failures: usize,
    pub duration: Duration,
}

pub struct IngestionPipeline {
    source: Arc<dyn CountrySource>,
    reconciler: Reconciler,
    propagator: WritePropagator,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn CountrySource>,
        store: Arc<dyn CountryStore>,
        cache: Arc<ReadThroughCache>,
    ) -> Self {
        Self {
            source,
            reconciler: Reconciler::new(store.clone(), cache.clone()),
            propagator: WritePropagator::new(store, cache),
        }
    }

    /// One full run. Any failure aborts it; nothing is reported as success
    /// unless the store accepted every write.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<IngestReport, IngestError> {
        let start = Instant::now();
        let result = self.run_inner(start).await;

        match &result {
            Ok(report) => {
                metrics::record_ingest_run("success", report.duration);
                info!(
                    fetched = report.fetched,
                    new = report.new,
                    updated = report.updated,
                    unchanged = report.unchanged,
                    cache_failures = report.cache_failures,
                    duration_ms = report.duration.as_millis() as u64,
                    "Ingestion run complete"
                );
            }
            Err(e) => {
                metrics::record_ingest_run("error", start.elapsed());
                error!(error = %e, "Ingestion run aborted");
            }
        }
        result
    }

    async fn run_inner(&self, start: Instant) -> Result<IngestReport, IngestError> {
        let batch = self.source.fetch_batch().await?;
        metrics::record_batch_size(batch.len());

        let plan = self.reconciler.classify(&batch).await?;
        let propagated = self.propagator.apply(&plan).await?;

        Ok(IngestReport {
            fetched: batch.len(),
            new: propagated.inserted,
            updated: propagated.updated,
            unchanged: plan.unchanged,
            cache_failures: propagated.cache_failures,
            duration: start.elapsed(),
        })
    }
}

/// Runs the pipeline every `interval`, never two runs at once.
pub struct IngestionScheduler {
    pipeline: Arc<IngestionPipeline>,
    interval: Duration,
    run_on_start: bool,
    running: Mutex<()>,
}

impl IngestionScheduler {
    pub fn new(pipeline: Arc<IngestionPipeline>, interval: Duration, run_on_start: bool) -> Self {
        Self {
            pipeline,
            interval,
            run_on_start,
            running: Mutex::new(()),
        }
    }

    /// Run now unless a run is already in progress.
    pub async fn trigger(&self) -> Result<IngestReport, IngestError> {
        let _guard = self.running.try_lock().map_err(|_| IngestError::AlreadyRunning)?;
        self.pipeline.run_once().await
    }

    /// Tick until `shutdown` flips to `true` or its sender is dropped.
    /// Failed runs are logged and retried at the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        if !self.run_on_start {
            // interval fires immediately; swallow that tick
            ticker.tick().await;
        }
        info!(interval_secs = self.interval.as_secs(), "Ingestion scheduler started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.trigger().await {
                        Ok(_) => {}
                        Err(IngestError::AlreadyRunning) => warn!("Skipping tick, previous run still in progress"),
                        Err(e) => warn!(error = %e, "Ingestion failed, retrying next cycle"),
                    }
                }
            }
        }
        info!("Ingestion scheduler stopped");
    }
}
