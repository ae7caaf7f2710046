//! Configuration resolution
//!
//! Turns a string key -> string override map (recommender defaults already
//! merged with rule-level overrides) into a fully typed parameter set. Every
//! recognized key has a hard-coded default; unrecognized keys are ignored for
//! forward compatibility; a value that fails to parse as its declared type is
//! a construction-time error.

use crate::error::{RecommenderError, Result};
use crate::models::{DimensionSet, ResourceDimension, Specification};
use crate::specification;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Typed parameters for one resource dimension
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionConfig {
    pub sample_interval: Duration,
    /// Percentile of the usage distribution to recommend, in (0, 1]
    pub percentile: f64,
    /// Proportional safety headroom added above the percentile estimate
    pub margin_fraction: f64,
    /// Fraction of the request the workload is intended to use
    pub target_utilization: f64,
    /// Usage window modelled by the histogram; also its decay half-life
    pub history_length: Duration,
    pub bucket_size: f64,
    pub max_value: f64,
}

/// Fully resolved recommender parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RecommenderConfig {
    pub dimensions: DimensionSet<DimensionConfig>,
    pub oom_protection: bool,
    pub oom_history_length: Duration,
    pub oom_bump_ratio: f64,
    pub specification: bool,
    pub specification_configs: Vec<Specification>,
    pub history_completion_check: bool,
}

impl RecommenderConfig {
    /// Resolve a merged override map into typed configuration.
    ///
    /// Fails with [`RecommenderError::Configuration`] when a recognized key
    /// carries an unparseable value or a resolved value violates an
    /// invariant; the recommender must not be created in that case.
    pub fn resolve(overrides: &BTreeMap<String, String>) -> Result<Self> {
        let dimensions = DimensionSet {
            cpu: DimensionConfig::resolve(ResourceDimension::Cpu, overrides)?,
            memory: DimensionConfig::resolve(ResourceDimension::Memory, overrides)?,
            accelerator_compute: DimensionConfig::resolve(
                ResourceDimension::AcceleratorCompute,
                overrides,
            )?,
            accelerator_memory: DimensionConfig::resolve(
                ResourceDimension::AcceleratorMemory,
                overrides,
            )?,
        };

        let oom_protection = get_bool(overrides, "oom-protection", true)?;
        let oom_history_length =
            get_duration(overrides, "oom-history-length", Duration::from_secs(168 * 3600))?;
        let oom_bump_ratio = get_float(overrides, "oom-bump-ratio", 1.2)?;
        if oom_bump_ratio < 1.0 {
            return Err(RecommenderError::configuration(
                "oom-bump-ratio",
                format!("{oom_bump_ratio} must be >= 1"),
            ));
        }

        let specification_enabled = get_bool(overrides, "specification", false)?;
        let specification_configs = match overrides.get("specification-config") {
            Some(raw) => specification::parse_catalog(raw)?,
            None => specification::default_catalog(),
        };

        let history_completion_check = get_bool(overrides, "history-completion-check", false)?;

        debug!(
            oom_protection,
            specification = specification_enabled,
            catalog_entries = specification_configs.len(),
            history_completion_check,
            "Resolved recommender configuration"
        );

        Ok(Self {
            dimensions,
            oom_protection,
            oom_history_length,
            oom_bump_ratio,
            specification: specification_enabled,
            specification_configs,
            history_completion_check,
        })
    }
}

impl DimensionConfig {
    fn resolve(dimension: ResourceDimension, overrides: &BTreeMap<String, String>) -> Result<Self> {
        let p = dimension.key_prefix();
        let (default_bucket, default_max) = match dimension {
            ResourceDimension::Cpu | ResourceDimension::AcceleratorCompute => (0.1, 100.0),
            ResourceDimension::Memory | ResourceDimension::AcceleratorMemory => {
                (104_857_600.0, 104_857_600_000.0)
            }
        };

        let config = Self {
            sample_interval: get_duration(
                overrides,
                &format!("{p}-sample-interval"),
                Duration::from_secs(60),
            )?,
            percentile: get_float(overrides, &format!("{p}-request-percentile"), 0.99)?,
            margin_fraction: get_float(overrides, &format!("{p}-request-margin-fraction"), 0.15)?,
            target_utilization: get_float(overrides, &format!("{p}-target-utilization"), 1.0)?,
            history_length: get_duration(
                overrides,
                &format!("{p}-model-history-length"),
                Duration::from_secs(168 * 3600),
            )?,
            bucket_size: get_float(overrides, &format!("{p}-histogram-bucket-size"), default_bucket)?,
            max_value: get_float(overrides, &format!("{p}-histogram-max-value"), default_max)?,
        };
        config.validate(p)?;
        Ok(config)
    }

    fn validate(&self, prefix: &str) -> Result<()> {
        if !(self.percentile > 0.0 && self.percentile <= 1.0) {
            return Err(RecommenderError::configuration(
                format!("{prefix}-request-percentile"),
                format!("{} must be in (0, 1]", self.percentile),
            ));
        }
        if self.margin_fraction < 0.0 {
            return Err(RecommenderError::configuration(
                format!("{prefix}-request-margin-fraction"),
                format!("{} must be >= 0", self.margin_fraction),
            ));
        }
        if self.target_utilization <= 0.0 {
            return Err(RecommenderError::configuration(
                format!("{prefix}-target-utilization"),
                format!("{} must be > 0", self.target_utilization),
            ));
        }
        if self.bucket_size <= 0.0 {
            return Err(RecommenderError::configuration(
                format!("{prefix}-histogram-bucket-size"),
                format!("{} must be > 0", self.bucket_size),
            ));
        }
        if self.bucket_size > self.max_value {
            return Err(RecommenderError::configuration(
                format!("{prefix}-histogram-bucket-size"),
                format!(
                    "bucket size {} exceeds histogram max value {}",
                    self.bucket_size, self.max_value
                ),
            ));
        }
        if self.history_length.is_zero() {
            return Err(RecommenderError::configuration(
                format!("{prefix}-model-history-length"),
                "history length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_float(overrides: &BTreeMap<String, String>, key: &str, default: f64) -> Result<f64> {
    match overrides.get(key) {
        Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
            RecommenderError::configuration(key, format!("`{raw}` is not a valid float"))
        }),
        None => Ok(default),
    }
}

fn get_bool(overrides: &BTreeMap<String, String>, key: &str, default: bool) -> Result<bool> {
    match overrides.get(key) {
        Some(raw) => raw.trim().parse::<bool>().map_err(|_| {
            RecommenderError::configuration(key, format!("`{raw}` is not a valid bool"))
        }),
        None => Ok(default),
    }
}

fn get_duration(overrides: &BTreeMap<String, String>, key: &str, default: Duration) -> Result<Duration> {
    match overrides.get(key) {
        Some(raw) => parse_duration(raw).ok_or_else(|| {
            RecommenderError::configuration(
                key,
                format!("`{raw}` is not a valid duration (expected e.g. `30s`, `1m`, `168h`)"),
            )
        }),
        None => Ok(default),
    }
}

/// Parse a Go-style duration string: one or more `<number><unit>` segments,
/// units `ms`, `s`, `m`, `h`, `d` (e.g. `1m`, `168h`, `1h30m`).
fn parse_duration(input: &str) -> Option<Duration> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return None;
    }
    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
        if digits_end == 0 {
            return None;
        }
        let value: f64 = rest[..digits_end].parse().ok()?;
        rest = &rest[digits_end..];
        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];
        let seconds = match unit {
            "ms" => value / 1000.0,
            "s" => value,
            "m" => value * 60.0,
            "h" => value * 3600.0,
            "d" => value * 86400.0,
            _ => return None,
        };
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        total += Duration::from_secs_f64(seconds);
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_resolve() {
        let config = RecommenderConfig::resolve(&BTreeMap::new()).unwrap();
        assert_eq!(config.dimensions.cpu.percentile, 0.99);
        assert_eq!(config.dimensions.cpu.margin_fraction, 0.15);
        assert_eq!(config.dimensions.cpu.bucket_size, 0.1);
        assert_eq!(config.dimensions.cpu.max_value, 100.0);
        assert_eq!(config.dimensions.memory.bucket_size, 104_857_600.0);
        assert_eq!(config.dimensions.memory.max_value, 104_857_600_000.0);
        assert_eq!(
            config.dimensions.cpu.history_length,
            Duration::from_secs(168 * 3600)
        );
        assert!(config.oom_protection);
        assert_eq!(config.oom_bump_ratio, 1.2);
        assert!(!config.specification);
        assert!(!config.history_completion_check);
        assert!(!config.specification_configs.is_empty());
    }

    #[test]
    fn test_overrides_applied_per_dimension() {
        let config = RecommenderConfig::resolve(&overrides(&[
            ("cpu-request-percentile", "0.95"),
            ("mem-request-margin-fraction", "0.3"),
            ("gpu-model-history-length", "24h"),
            ("gpumem-histogram-bucket-size", "1048576"),
        ]))
        .unwrap();
        assert_eq!(config.dimensions.cpu.percentile, 0.95);
        assert_eq!(config.dimensions.memory.percentile, 0.99);
        assert_eq!(config.dimensions.memory.margin_fraction, 0.3);
        assert_eq!(
            config.dimensions.accelerator_compute.history_length,
            Duration::from_secs(24 * 3600)
        );
        assert_eq!(config.dimensions.accelerator_memory.bucket_size, 1_048_576.0);
    }

    #[test]
    fn test_unparseable_override_is_fatal() {
        let err = RecommenderConfig::resolve(&overrides(&[("oom-bump-ratio", "fast")]))
            .unwrap_err();
        assert!(matches!(err, RecommenderError::Configuration { ref key, .. } if key == "oom-bump-ratio"));

        let err = RecommenderConfig::resolve(&overrides(&[("specification", "yes")])).unwrap_err();
        assert!(matches!(err, RecommenderError::Configuration { ref key, .. } if key == "specification"));

        let err = RecommenderConfig::resolve(&overrides(&[("cpu-model-history-length", "week")]))
            .unwrap_err();
        assert!(matches!(err, RecommenderError::Configuration { .. }));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config = RecommenderConfig::resolve(&overrides(&[("future-knob", "whatever")]));
        assert!(config.is_ok());
    }

    #[test]
    fn test_invariants_enforced() {
        let err = RecommenderConfig::resolve(&overrides(&[("cpu-request-percentile", "1.5")]))
            .unwrap_err();
        assert!(matches!(err, RecommenderError::Configuration { .. }));

        let err = RecommenderConfig::resolve(&overrides(&[("cpu-request-percentile", "0")]))
            .unwrap_err();
        assert!(matches!(err, RecommenderError::Configuration { .. }));

        // bucket size must not exceed max value
        let err = RecommenderConfig::resolve(&overrides(&[
            ("mem-histogram-bucket-size", "200"),
            ("mem-histogram-max-value", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, RecommenderError::Configuration { .. }));

        let err =
            RecommenderConfig::resolve(&overrides(&[("oom-bump-ratio", "0.5")])).unwrap_err();
        assert!(matches!(err, RecommenderError::Configuration { ref key, .. } if key == "oom-bump-ratio"));
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("168h"), Some(Duration::from_secs(168 * 3600)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2d"), Some(Duration::from_secs(172_800)));
        assert_eq!(parse_duration("1.5h"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration("10parsecs"), None);
    }
}
