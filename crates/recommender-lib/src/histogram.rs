//! Time-decayed usage histogram
//!
//! Maintains a fixed-bucket frequency distribution of observed usage values
//! for one workload and dimension. Every insert first ages all existing
//! weights by `exp(-dt * ln2 / half_life)` with the half-life equal to the
//! configured history length, so a lone sample's weight halves after exactly
//! one history window. The decay-on-write scheme keeps inserts O(buckets)
//! without replaying history, which is why out-of-order samples are rejected
//! rather than reordered.

use crate::config::DimensionConfig;
use crate::error::{RecommenderError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Total weight below this is treated as an empty histogram
const MIN_TOTAL_WEIGHT: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct DecayingHistogram {
    bucket_size: f64,
    max_value: f64,
    half_life: Duration,
    /// Per-bucket decayed weights; the final slot is the overflow bucket
    /// for values >= `max_value`
    weights: Vec<f64>,
    total_weight: f64,
    earliest_sample: Option<DateTime<Utc>>,
    latest_sample: Option<DateTime<Utc>>,
    /// Point in time the weights are decayed to; advanced by both sample
    /// ingestion and explicit decay
    reference_time: Option<DateTime<Utc>>,
}

impl DecayingHistogram {
    pub fn new(config: &DimensionConfig) -> Self {
        let buckets = (config.max_value / config.bucket_size).ceil() as usize;
        Self {
            bucket_size: config.bucket_size,
            max_value: config.max_value,
            half_life: config.history_length,
            weights: vec![0.0; buckets + 1],
            total_weight: 0.0,
            earliest_sample: None,
            latest_sample: None,
            reference_time: None,
        }
    }

    /// Record one observation with weight 1 at `timestamp`.
    ///
    /// The value is clamped to `[0, max_value]`; values at or above
    /// `max_value` land in the overflow bucket. Fails with
    /// [`RecommenderError::OutOfOrderSample`] when `timestamp` is strictly
    /// older than the latest applied sample.
    pub fn add_sample(&mut self, value: f64, timestamp: DateTime<Utc>) -> Result<()> {
        self.decay_to(timestamp)?;
        let index = self.bucket_index(value.clamp(0.0, self.max_value));
        self.weights[index] += 1.0;
        self.total_weight += 1.0;
        if self.earliest_sample.is_none() {
            self.earliest_sample = Some(timestamp);
        }
        self.latest_sample = Some(timestamp);
        self.reference_time = Some(timestamp);
        Ok(())
    }

    /// Age all bucket weights forward to `timestamp` without recording a
    /// sample. Called by [`add_sample`](Self::add_sample); also usable on its
    /// own to age a histogram that has gone quiet. Uniform decay leaves
    /// percentiles unchanged, only the total weight drops.
    pub fn decay_to(&mut self, timestamp: DateTime<Utc>) -> Result<()> {
        let Some(reference) = self.reference_time else {
            return Ok(());
        };
        if timestamp < reference {
            return Err(RecommenderError::OutOfOrderSample {
                timestamp,
                latest: reference,
            });
        }
        let elapsed = (timestamp - reference).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 {
            return Ok(());
        }
        let factor = (-elapsed * std::f64::consts::LN_2 / self.half_life.as_secs_f64()).exp();
        for weight in &mut self.weights {
            *weight *= factor;
        }
        self.total_weight *= factor;
        self.reference_time = Some(timestamp);
        Ok(())
    }

    /// Value at percentile `p` of the decayed distribution.
    ///
    /// Walks buckets in increasing order, accumulating weight until the
    /// cumulative weight reaches `p * total_weight`, and returns that
    /// bucket's **lower bound** (no intra-bucket interpolation; the overflow
    /// bucket reports `max_value`). Fails with
    /// [`RecommenderError::InsufficientData`] when no weight has accumulated.
    pub fn value_at_percentile(&self, p: f64) -> Result<f64> {
        if self.is_empty() {
            return Err(RecommenderError::InsufficientData);
        }
        let target = p.clamp(0.0, 1.0) * self.total_weight;
        let mut cumulative = 0.0;
        for (index, weight) in self.weights.iter().enumerate() {
            cumulative += weight;
            if cumulative >= target && *weight > 0.0 {
                return Ok(self.bucket_start(index));
            }
        }
        // Rounding left the target just above the final cumulative weight;
        // answer with the highest occupied bucket.
        let last_occupied = self
            .weights
            .iter()
            .rposition(|w| *w > 0.0)
            .unwrap_or(self.weights.len() - 1);
        Ok(self.bucket_start(last_occupied))
    }

    /// Duration between the earliest and latest accepted samples
    pub fn sample_span(&self) -> Duration {
        match (self.earliest_sample, self.latest_sample) {
            (Some(earliest), Some(latest)) => (latest - earliest).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight < MIN_TOTAL_WEIGHT
    }

    fn bucket_index(&self, value: f64) -> usize {
        if value >= self.max_value {
            self.weights.len() - 1
        } else {
            ((value / self.bucket_size) as usize).min(self.weights.len() - 2)
        }
    }

    fn bucket_start(&self, index: usize) -> f64 {
        if index == self.weights.len() - 1 {
            self.max_value
        } else {
            index as f64 * self.bucket_size
        }
    }
}
