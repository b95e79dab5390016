// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Periodic ingestion of upstream country data.
//!
//! A run fetches the full upstream batch, classifies every record against
//! what is already known ([`Reconciler`]), then writes only new and changed
//! records to the store and refreshes their cache entries
//! ([`WritePropagator`]).

pub mod pipeline;
pub mod propagator;
pub mod reconciler;
pub mod source;

pub use pipeline::{IngestReport, IngestionPipeline, IngestionScheduler};
pub use propagator::{PropagationReport, WritePropagator};
pub use reconciler::{Decision, ReconcilePlan, Reconciler};
pub use source::{CountrySource, RestCountriesClient, SourceError, StaticSource};
