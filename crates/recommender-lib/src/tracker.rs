//! Per-workload state tracking
//!
//! Owns the mutable histogram and OOM-event state for every tracked
//! workload. Entries are independent: sample ingestion and recommendation
//! never interleave for the same workload (the map guards each entry
//! exclusively), while distinct workloads proceed in parallel. A failure
//! for one workload is logged and never aborts the cycle for the others.

use crate::error::Result;
use crate::histogram::DecayingHistogram;
use crate::models::{
    DimensionSet, OomEvent, Recommendation, ResourceDimension, UsageSample,
};
use crate::recommender::ResourceRecommender;
use crate::config::RecommenderConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Histograms and OOM history for one workload
#[derive(Debug)]
pub struct WorkloadState {
    histograms: DimensionSet<DecayingHistogram>,
    oom_events: Vec<OomEvent>,
}

impl WorkloadState {
    pub fn new(config: &RecommenderConfig) -> Self {
        Self {
            histograms: DimensionSet::from_fn(|d| DecayingHistogram::new(config.dimensions.get(d))),
            oom_events: Vec::new(),
        }
    }

    pub fn histogram(&self, dimension: ResourceDimension) -> &DecayingHistogram {
        self.histograms.get(dimension)
    }

    pub fn ingest(&mut self, dimension: ResourceDimension, sample: UsageSample) -> Result<()> {
        self.histograms
            .get_mut(dimension)
            .add_sample(sample.value, sample.timestamp)
    }

    /// Record an OOM kill, pruning events that have aged out of the
    /// retention window so the list stays bounded.
    pub fn record_oom_event(&mut self, event: OomEvent, retention: Duration) {
        if let Some(cutoff) = chrono::TimeDelta::from_std(retention)
            .ok()
            .and_then(|window| event.timestamp.checked_sub_signed(window))
        {
            self.oom_events.retain(|e| e.timestamp >= cutoff);
        }
        self.oom_events.push(event);
    }

    pub fn oom_events(&self) -> &[OomEvent] {
        &self.oom_events
    }
}

/// Tracks all workloads for one recommender instance
pub struct WorkloadTracker {
    recommender: ResourceRecommender,
    workloads: DashMap<String, WorkloadState>,
}

impl WorkloadTracker {
    pub fn new(recommender: ResourceRecommender) -> Self {
        Self {
            recommender,
            workloads: DashMap::new(),
        }
    }

    pub fn recommender(&self) -> &ResourceRecommender {
        &self.recommender
    }

    /// Feed one usage sample for a workload and dimension, creating the
    /// workload entry on first sight. Out-of-order samples are rejected and
    /// logged; the caller's contract is non-decreasing timestamps per
    /// workload.
    pub fn ingest_sample(
        &self,
        workload: &str,
        dimension: ResourceDimension,
        sample: UsageSample,
    ) -> Result<()> {
        let mut state = self
            .workloads
            .entry(workload.to_string())
            .or_insert_with(|| WorkloadState::new(self.recommender.config()));
        state.ingest(dimension, sample).map_err(|e| {
            warn!(workload = %workload, dimension = %dimension, error = %e, "Rejected sample");
            e
        })
    }

    pub fn record_oom_event(&self, workload: &str, event: OomEvent) {
        let retention = self.recommender.config().oom_history_length;
        let mut state = self
            .workloads
            .entry(workload.to_string())
            .or_insert_with(|| WorkloadState::new(self.recommender.config()));
        state.record_oom_event(event, retention);
        debug!(
            workload = %workload,
            memory_at_failure = event.memory_at_failure,
            "Recorded OOM event"
        );
    }

    /// Compute the recommendation for one tracked workload.
    pub fn recommend(&self, workload: &str, now: DateTime<Utc>) -> Result<Recommendation> {
        let state = self
            .workloads
            .get(workload)
            .ok_or(crate::error::RecommenderError::InsufficientData)?;
        self.recommender.recommend(workload, &state, now)
    }

    /// One evaluation cycle over every tracked workload. Per-workload
    /// failures are logged and skipped; the rest of the cycle proceeds.
    pub fn recommend_all(&self, now: DateTime<Utc>) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();
        for entry in self.workloads.iter() {
            match self.recommender.recommend(entry.key(), entry.value(), now) {
                Ok(recommendation) => recommendations.push(recommendation),
                Err(e) => {
                    warn!(workload = %entry.key(), error = %e, "Skipping workload this cycle");
                }
            }
        }
        recommendations
    }

    /// Drop a workload that is no longer tracked by the lifecycle manager.
    pub fn remove_workload(&self, workload: &str) {
        self.workloads.remove(workload);
    }

    pub fn stats(&self) -> TrackerStats {
        let total_workloads = self.workloads.len();
        let workloads_with_oom_events = self
            .workloads
            .iter()
            .filter(|entry| !entry.oom_events().is_empty())
            .count();
        TrackerStats {
            total_workloads,
            workloads_with_oom_events,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerStats {
    pub total_workloads: usize,
    pub workloads_with_oom_events: usize,
}
