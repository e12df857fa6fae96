//! Capacity-degradation coefficient: how far into its dying arc an
//! automaton's cognitive/operational capacity has eroded, as a value in
//! `0.0..=1.0`.
//!
//! The base curve is a function only of elapsed hours since the sealed
//! clock triggered and the dying-duration it was sealed with, and is
//! monotonically non-decreasing by construction (an exponential approach to
//! 1.0). A small lunar wobble, bounded to `±0.05`, is layered on top for the
//! value callers actually read — it can make isolated samples dip slightly
//! even while the underlying trend keeps climbing.

use chrono::{DateTime, Utc};
use lifecycle_clock::lunar_position_at;
use serde::{Deserialize, Serialize};

const LUNAR_WOBBLE_AMPLITUDE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub base: f64,
    pub lunar_wobble: f64,
    pub coefficient: f64,
}

/// Base (unwobbled) degradation coefficient for `hours_since_trigger` hours
/// into a dying arc of `dying_duration_days` days.
///
/// Steepness is derived from the duration so that a short dying arc
/// degrades faster than a long one: the curve reaches ~98% of its range by
/// the end of the sealed duration regardless of how long that duration is.
pub fn base_coefficient(hours_since_trigger: f64, dying_duration_days: u32) -> f64 {
    let hours = hours_since_trigger.max(0.0);
    let total_hours = (dying_duration_days as f64 * 24.0).max(1.0);
    let steepness = 4.0 / total_hours;
    (1.0 - (-steepness * hours).exp()).clamp(0.0, 1.0)
}

/// Full degradation reading at `now`, given the sealed clock's trigger time
/// and dying duration.
pub fn degradation_at(
    trigger_at: DateTime<Utc>,
    dying_duration_days: u32,
    now: DateTime<Utc>,
) -> Degradation {
    let hours_since_trigger = (now - trigger_at).num_seconds() as f64 / 3600.0;
    let base = base_coefficient(hours_since_trigger, dying_duration_days);

    let lunar = lunar_position_at(now);
    let lunar_wobble = (lunar.cycle_fraction * std::f64::consts::TAU).sin() * LUNAR_WOBBLE_AMPLITUDE;

    Degradation {
        base,
        lunar_wobble,
        coefficient: (base + lunar_wobble).clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn base_coefficient_is_monotonically_non_decreasing() {
        let duration_days = 5;
        let mut previous = base_coefficient(0.0, duration_days);
        for hour in (0..=(duration_days as i64 * 24 * 2)).step_by(3) {
            let current = base_coefficient(hour as f64, duration_days);
            assert!(current >= previous - 1e-12);
            previous = current;
        }
    }

    #[test]
    fn base_coefficient_starts_near_zero_and_approaches_one() {
        let duration_days = 3;
        assert!(base_coefficient(0.0, duration_days) < 0.01);
        assert!(base_coefficient(duration_days as f64 * 24.0 * 3.0, duration_days) > 0.95);
    }

    #[test]
    fn shorter_duration_degrades_faster_at_a_fixed_hour() {
        let fast = base_coefficient(24.0, 2);
        let slow = base_coefficient(24.0, 7);
        assert!(fast > slow);
    }

    #[test]
    fn wobble_is_bounded_and_coefficient_stays_in_unit_range() {
        let trigger = Utc::now();
        for day in 0..60 {
            let now = trigger + Duration::hours(day * 6);
            let reading = degradation_at(trigger, 5, now);
            assert!(reading.lunar_wobble.abs() <= LUNAR_WOBBLE_AMPLITUDE + 1e-12);
            assert!((0.0..=1.0).contains(&reading.coefficient));
        }
    }
}
