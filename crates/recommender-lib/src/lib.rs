//! Recommender library for workload resource requests
//!
//! This crate provides the core functionality for:
//! - Configuration resolution from string key/value overrides
//! - Time-decayed usage histograms with percentile estimation
//! - OOM protection for memory recommendations
//! - Snapping recommendations onto specification catalogs
//! - Per-workload state tracking for evaluation cycles

pub mod config;
pub mod error;
pub mod estimator;
pub mod histogram;
pub mod models;
pub mod oom;
pub mod recommender;
pub mod registry;
pub mod specification;
pub mod tracker;

pub use config::{DimensionConfig, RecommenderConfig};
pub use error::{RecommenderError, Result};
pub use estimator::PercentileEstimator;
pub use histogram::DecayingHistogram;
pub use models::*;
pub use oom::OomAdjuster;
pub use recommender::{ResourceRecommender, RECOMMENDER_NAME};
pub use registry::{RecommenderFactory, RecommenderRegistry};
pub use specification::{default_catalog, match_specification, parse_catalog};
pub use tracker::{TrackerStats, WorkloadState, WorkloadTracker};
