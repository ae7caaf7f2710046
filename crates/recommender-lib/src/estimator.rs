//! Percentile-based request estimation
//!
//! Reads a configured percentile off a histogram and applies the safety
//! margin and target-utilization adjustments to produce the raw recommended
//! quantity for one dimension.

use crate::config::DimensionConfig;
use crate::error::{RecommenderError, Result};
use crate::histogram::DecayingHistogram;

pub struct PercentileEstimator {
    history_completion_check: bool,
}

impl PercentileEstimator {
    pub fn new(history_completion_check: bool) -> Self {
        Self {
            history_completion_check,
        }
    }

    /// Estimate the request for one dimension:
    /// `percentile * (1 + margin_fraction) / target_utilization`.
    ///
    /// With the history completion check enabled, fails with
    /// [`RecommenderError::IncompleteHistory`] until the sample history
    /// covers at least the configured model window, rather than returning an
    /// under-confident figure.
    pub fn estimate(&self, config: &DimensionConfig, histogram: &DecayingHistogram) -> Result<f64> {
        if self.history_completion_check {
            let covered = histogram.sample_span();
            if covered < config.history_length {
                return Err(RecommenderError::IncompleteHistory {
                    covered,
                    required: config.history_length,
                });
            }
        }
        let raw = histogram.value_at_percentile(config.percentile)?;
        Ok(raw * (1.0 + config.margin_fraction) / config.target_utilization)
    }
}
