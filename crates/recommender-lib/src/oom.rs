//! Out-of-memory protection
//!
//! A workload that was killed for exceeding memory must never receive a
//! recommendation at or below the level that caused the kill. When recent
//! OOM events exist, the memory estimate is raised to the worst observed
//! failure level times a configured bump ratio; the adjustment only ever
//! raises, never lowers.

use crate::models::OomEvent;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

pub struct OomAdjuster {
    enabled: bool,
    history_length: Duration,
    bump_ratio: f64,
}

impl OomAdjuster {
    pub fn new(enabled: bool, history_length: Duration, bump_ratio: f64) -> Self {
        Self {
            enabled,
            history_length,
            bump_ratio,
        }
    }

    /// `max(base_estimate, worst recent failure level * bump_ratio)`.
    ///
    /// Events older than the retention window relative to `now` are ignored;
    /// with no recent events (or protection disabled) the base estimate
    /// passes through unchanged.
    pub fn adjust_memory(
        &self,
        base_estimate: f64,
        events: &[OomEvent],
        now: DateTime<Utc>,
    ) -> f64 {
        if !self.enabled {
            return base_estimate;
        }
        // an unrepresentably long retention window keeps every event
        let cutoff = chrono::TimeDelta::from_std(self.history_length)
            .ok()
            .and_then(|window| now.checked_sub_signed(window));
        let worst_failure = events
            .iter()
            .filter(|e| cutoff.map_or(true, |c| e.timestamp >= c))
            .map(|e| e.memory_at_failure)
            .fold(f64::NEG_INFINITY, f64::max);
        if !worst_failure.is_finite() {
            return base_estimate;
        }
        let bumped = worst_failure * self.bump_ratio;
        if bumped > base_estimate {
            debug!(
                base_estimate,
                worst_failure,
                bumped,
                "Raising memory recommendation after recent OOM kill"
            );
            bumped
        } else {
            base_estimate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn event(age_secs: i64, memory: f64) -> OomEvent {
        OomEvent {
            timestamp: t0() - TimeDelta::seconds(age_secs),
            memory_at_failure: memory,
        }
    }

    #[test]
    fn test_recent_oom_bumps_estimate() {
        let adjuster = OomAdjuster::new(true, Duration::from_secs(168 * 3600), 1.2);
        // killed at 2 GiB, base estimate 1 GiB -> 2.4 GiB
        let adjusted = adjuster.adjust_memory(GIB, &[event(3600, 2.0 * GIB)], t0());
        assert!((adjusted - 2.4 * GIB).abs() < 1.0, "adjusted was {adjusted}");
    }

    #[test]
    fn test_no_events_passes_through() {
        let adjuster = OomAdjuster::new(true, Duration::from_secs(3600), 1.2);
        assert_eq!(adjuster.adjust_memory(GIB, &[], t0()), GIB);
    }

    #[test]
    fn test_stale_events_ignored() {
        let adjuster = OomAdjuster::new(true, Duration::from_secs(3600), 1.2);
        let adjusted = adjuster.adjust_memory(GIB, &[event(7200, 4.0 * GIB)], t0());
        assert_eq!(adjusted, GIB);
    }

    #[test]
    fn test_never_lowers_estimate() {
        let adjuster = OomAdjuster::new(true, Duration::from_secs(168 * 3600), 1.0);
        // base already above the bumped failure level
        let base = 8.0 * GIB;
        let adjusted = adjuster.adjust_memory(base, &[event(60, 2.0 * GIB)], t0());
        assert_eq!(adjusted, base);
    }

    #[test]
    fn test_monotonicity_over_bases() {
        let adjuster = OomAdjuster::new(true, Duration::from_secs(168 * 3600), 1.5);
        let events = [event(60, GIB), event(120, 3.0 * GIB)];
        for base in [0.0, 0.5 * GIB, 2.0 * GIB, 10.0 * GIB] {
            assert!(adjuster.adjust_memory(base, &events, t0()) >= base);
        }
    }

    #[test]
    fn test_worst_event_wins() {
        let adjuster = OomAdjuster::new(true, Duration::from_secs(168 * 3600), 1.2);
        let events = [event(60, GIB), event(120, 3.0 * GIB), event(180, 2.0 * GIB)];
        let adjusted = adjuster.adjust_memory(GIB, &events, t0());
        assert!((adjusted - 3.6 * GIB).abs() < 1.0);
    }

    #[test]
    fn test_disabled_protection_is_inert() {
        let adjuster = OomAdjuster::new(false, Duration::from_secs(168 * 3600), 1.2);
        assert_eq!(adjuster.adjust_memory(GIB, &[event(60, 4.0 * GIB)], t0()), GIB);
    }
}
