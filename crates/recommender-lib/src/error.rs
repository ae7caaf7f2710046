//! Error types for the recommender core
//!
//! Construction-time configuration problems are fatal to creating a
//! recommender; everything else is per-workload, per-cycle and must never
//! abort processing of other workloads.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommenderError {
    /// An override failed to parse as its declared type, or a config
    /// invariant was violated. Raised at construction only.
    #[error("invalid configuration for `{key}`: {reason}")]
    Configuration { key: String, reason: String },

    /// The histogram has no accumulated weight.
    #[error("no usage samples accumulated")]
    InsufficientData,

    /// History completion check is on and the sample history is shorter
    /// than the configured model window.
    #[error("sample history covers {covered:?} of the required {required:?}")]
    IncompleteHistory { covered: Duration, required: Duration },

    /// No catalog entry dominates the recommended vector in all demanded
    /// dimensions.
    #[error("no specification dominates the recommended resource vector")]
    NoFeasibleSpecification,

    /// Samples must arrive in non-decreasing timestamp order; the decay
    /// math is O(1) per insert only because replay never happens.
    #[error("sample at {timestamp} predates the latest applied sample at {latest}")]
    OutOfOrderSample {
        timestamp: DateTime<Utc>,
        latest: DateTime<Utc>,
    },
}

impl RecommenderError {
    pub(crate) fn configuration(key: impl Into<String>, reason: impl Into<String>) -> Self {
        RecommenderError::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecommenderError>;
