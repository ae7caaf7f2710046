//! Resource recommender
//!
//! Ties the pipeline together for one workload: per-dimension percentile
//! estimation, OOM protection on the memory estimate, and optional snapping
//! of the resulting vector onto a specification catalog entry.

use crate::config::RecommenderConfig;
use crate::error::{RecommenderError, Result};
use crate::estimator::PercentileEstimator;
use crate::models::{DimensionSet, OomEvent, Recommendation, ResourceDimension};
use crate::oom::OomAdjuster;
use crate::specification;
use crate::tracker::WorkloadState;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Name the resource recommender registers under
pub const RECOMMENDER_NAME: &str = "resource";

pub struct ResourceRecommender {
    config: RecommenderConfig,
    estimator: PercentileEstimator,
    oom_adjuster: OomAdjuster,
}

impl ResourceRecommender {
    /// Build a recommender from a merged override map.
    ///
    /// The only failure mode is [`RecommenderError::Configuration`]; once a
    /// recommender exists its parameters are immutable (rebuild to change
    /// them).
    pub fn new(overrides: &std::collections::BTreeMap<String, String>) -> Result<Self> {
        let config = RecommenderConfig::resolve(overrides)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: RecommenderConfig) -> Self {
        info!(
            specification = config.specification,
            oom_protection = config.oom_protection,
            history_completion_check = config.history_completion_check,
            "Creating resource recommender"
        );
        let estimator = PercentileEstimator::new(config.history_completion_check);
        let oom_adjuster = OomAdjuster::new(
            config.oom_protection,
            config.oom_history_length,
            config.oom_bump_ratio,
        );
        Self {
            config,
            estimator,
            oom_adjuster,
        }
    }

    pub fn name(&self) -> &'static str {
        RECOMMENDER_NAME
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Compute the recommendation for one workload at `now`.
    ///
    /// CPU and memory estimates are mandatory; accelerator dimensions the
    /// workload never reported usage on are omitted. Any failure here is
    /// local to this workload and cycle.
    pub fn recommend(
        &self,
        workload: &str,
        state: &WorkloadState,
        now: DateTime<Utc>,
    ) -> Result<Recommendation> {
        let mut requests: DimensionSet<Option<f64>> = DimensionSet::default();
        for dimension in ResourceDimension::ALL {
            let histogram = state.histogram(dimension);
            if histogram.is_empty() {
                if dimension.is_required() {
                    return Err(RecommenderError::InsufficientData);
                }
                continue;
            }
            let estimate = self
                .estimator
                .estimate(self.config.dimensions.get(dimension), histogram)?;
            *requests.get_mut(dimension) = Some(estimate);
        }

        if let Some(base) = requests.memory {
            requests.memory =
                Some(self.adjust_memory(base, state.oom_events(), now));
        }

        let matched = if self.config.specification {
            let spec = specification::match_specification(
                &requests,
                &self.config.specification_configs,
            )?;
            // snap every demanded dimension up to the matched tier
            for dimension in ResourceDimension::ALL {
                if requests.get(dimension).is_some() {
                    *requests.get_mut(dimension) = spec.capacity(dimension);
                }
            }
            Some(spec.name.clone())
        } else {
            None
        };

        debug!(
            workload = %workload,
            cpu = ?requests.cpu,
            memory = ?requests.memory,
            specification = ?matched,
            "Computed recommendation"
        );

        Ok(Recommendation {
            workload: workload.to_string(),
            requests,
            specification: matched,
            generated_at: now,
        })
    }

    /// Apply OOM protection to a memory estimate.
    pub fn adjust_memory(&self, base_estimate: f64, events: &[OomEvent], now: DateTime<Utc>) -> f64 {
        self.oom_adjuster.adjust_memory(base_estimate, events, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UsageSample;
    use chrono::TimeDelta;
    use std::collections::BTreeMap;

    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: f64 = 1024.0 * MIB;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn state_with_usage(
        recommender: &ResourceRecommender,
        cpu: f64,
        memory: f64,
        count: usize,
    ) -> WorkloadState {
        let mut state = WorkloadState::new(recommender.config());
        for i in 0..count {
            let at = t0() + TimeDelta::seconds(i as i64 * 60);
            state
                .ingest(ResourceDimension::Cpu, UsageSample { timestamp: at, value: cpu })
                .unwrap();
            state
                .ingest(
                    ResourceDimension::Memory,
                    UsageSample { timestamp: at, value: memory },
                )
                .unwrap();
        }
        state
    }

    #[test]
    fn test_recommendation_pipeline_without_specification() {
        let recommender = ResourceRecommender::new(&BTreeMap::new()).unwrap();
        let state = state_with_usage(&recommender, 0.5, 400.0 * MIB, 100);
        let rec = recommender
            .recommend("default/web", &state, t0() + TimeDelta::seconds(100 * 60))
            .unwrap();
        let cpu = rec.requests.cpu.unwrap();
        assert!((cpu - 0.575).abs() < 1e-9, "cpu was {cpu}");
        assert!(rec.requests.memory.unwrap() > 0.0);
        assert!(rec.requests.accelerator_compute.is_none());
        assert!(rec.specification.is_none());
    }

    #[test]
    fn test_missing_required_dimension_is_insufficient_data() {
        let recommender = ResourceRecommender::new(&BTreeMap::new()).unwrap();
        let mut state = WorkloadState::new(recommender.config());
        state
            .ingest(
                ResourceDimension::Cpu,
                UsageSample { timestamp: t0(), value: 0.5 },
            )
            .unwrap();
        // no memory samples at all
        let err = recommender.recommend("default/web", &state, t0()).unwrap_err();
        assert!(matches!(err, RecommenderError::InsufficientData));
    }

    #[test]
    fn test_oom_event_raises_memory() {
        let recommender = ResourceRecommender::new(&BTreeMap::new()).unwrap();
        let mut state = state_with_usage(&recommender, 0.5, 0.9 * GIB, 100);
        state.record_oom_event(
            OomEvent {
                timestamp: t0() + TimeDelta::seconds(50 * 60),
                memory_at_failure: 2.0 * GIB,
            },
            recommender.config().oom_history_length,
        );
        let rec = recommender
            .recommend("default/web", &state, t0() + TimeDelta::seconds(100 * 60))
            .unwrap();
        let memory = rec.requests.memory.unwrap();
        assert!((memory - 2.4 * GIB).abs() < 1.0, "memory was {memory}");
    }

    #[test]
    fn test_specification_mode_snaps_vector() {
        let recommender = ResourceRecommender::new(&overrides(&[
            ("specification", "true"),
            ("specification-config", "1c1g,2c2g"),
        ]))
        .unwrap();
        let state = state_with_usage(&recommender, 0.5, 400.0 * MIB, 100);
        let rec = recommender
            .recommend("default/web", &state, t0() + TimeDelta::seconds(100 * 60))
            .unwrap();
        assert_eq!(rec.specification.as_deref(), Some("1c1g"));
        assert_eq!(rec.requests.cpu, Some(1.0));
        assert_eq!(rec.requests.memory, Some(GIB));
    }

    #[test]
    fn test_specification_mode_propagates_no_feasible() {
        let recommender = ResourceRecommender::new(&overrides(&[
            ("specification", "true"),
            ("specification-config", "0.25c0.25g"),
        ]))
        .unwrap();
        let state = state_with_usage(&recommender, 4.0, 8.0 * GIB, 100);
        let err = recommender
            .recommend("default/web", &state, t0() + TimeDelta::seconds(100 * 60))
            .unwrap_err();
        assert!(matches!(err, RecommenderError::NoFeasibleSpecification));
    }

    #[test]
    fn test_history_completion_check_withholds() {
        let recommender = ResourceRecommender::new(&overrides(&[
            ("history-completion-check", "true"),
        ]))
        .unwrap();
        // an hour and a half of samples against the default 168h window
        let state = state_with_usage(&recommender, 0.5, 400.0 * MIB, 100);
        let err = recommender
            .recommend("default/web", &state, t0() + TimeDelta::seconds(100 * 60))
            .unwrap_err();
        assert!(matches!(err, RecommenderError::IncompleteHistory { .. }));
    }
}
