//! Birth-anchored age accounting, lunar cycle position, and Wheel-of-the-Year
//! seasonal position for an automaton.
//!
//! Everything here is a pure function of a birth timestamp and "now" — no
//! state is owned by this crate. Callers (the mood engine, the degradation
//! curve, the context builder) hold the birth timestamp and ask this crate
//! for a read as often as they like.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use error_types::{LifecycleError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Average length of a synodic (new-moon-to-new-moon) lunar month, in seconds.
const SYNODIC_MONTH_SECS: f64 = 29.530_588_861 * 86_400.0;

/// A known new moon epoch (2000-01-06T18:14:00Z), used as the lunar reference point.
fn lunar_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 6, 18, 14, 0).unwrap()
}

/// Birth-anchored age of the automaton as of `now`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Age {
    pub days: f64,
    pub hours: f64,
}

/// Computes the age between `birth` and `now`.
///
/// Returns [`LifecycleError::ClockSkew`] if `now` precedes `birth`: the
/// caller's system clock has moved backwards relative to the recorded birth
/// timestamp, and every age-derived calculation downstream (degradation,
/// mood, throttle) would otherwise go negative.
pub fn age_at(birth: DateTime<Utc>, now: DateTime<Utc>) -> Result<Age> {
    if now < birth {
        return Err(LifecycleError::ClockSkew);
    }
    let elapsed = now - birth;
    let hours = elapsed.num_seconds() as f64 / 3600.0;
    Ok(Age {
        days: hours / 24.0,
        hours,
    })
}

/// Where `now` sits within the current lunar cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LunarPosition {
    /// Day of the current cycle, `0..=29`, `0` is new moon.
    pub lunar_day: u8,
    /// Fractional position within the cycle, `0.0..1.0`.
    pub cycle_fraction: f64,
    /// Illumination-style phase angle, `0.0` new moon, `1.0` full moon, back to `0.0`.
    pub illumination: f64,
}

/// Computes the Moon's position in its cycle at `now`, independent of birth.
pub fn lunar_position_at(now: DateTime<Utc>) -> LunarPosition {
    let elapsed_secs = (now - lunar_epoch()).num_seconds() as f64;
    let cycle_fraction = (elapsed_secs.rem_euclid(SYNODIC_MONTH_SECS)) / SYNODIC_MONTH_SECS;
    let lunar_day = (cycle_fraction * 29.530_588_861) as u8;
    // Illumination peaks at the midpoint of the cycle (full moon) and is zero
    // at both ends (new moon): a triangle wave over the fraction.
    let illumination = 1.0 - (2.0 * cycle_fraction - 1.0).abs();

    LunarPosition {
        lunar_day: lunar_day.min(29),
        cycle_fraction,
        illumination,
    }
}

/// One of the eight solar festivals of the Wheel of the Year, anchored to a
/// fixed month/day in the Gregorian calendar (cross-quarter days approximated
/// to their conventional calendar dates rather than computed astronomically).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Festival {
    Samhain,
    Yule,
    Imbolc,
    Ostara,
    Beltane,
    Litha,
    Lughnasadh,
    Mabon,
}

impl Festival {
    pub fn as_str(&self) -> &'static str {
        match self {
            Festival::Samhain => "samhain",
            Festival::Yule => "yule",
            Festival::Imbolc => "imbolc",
            Festival::Ostara => "ostara",
            Festival::Beltane => "beltane",
            Festival::Litha => "litha",
            Festival::Lughnasadh => "lughnasadh",
            Festival::Mabon => "mabon",
        }
    }

    fn month_day(&self) -> (u32, u32) {
        match self {
            Festival::Samhain => (10, 31),
            Festival::Yule => (12, 21),
            Festival::Imbolc => (2, 1),
            Festival::Ostara => (3, 20),
            Festival::Beltane => (5, 1),
            Festival::Litha => (6, 21),
            Festival::Lughnasadh => (8, 1),
            Festival::Mabon => (9, 22),
        }
    }
}

static WHEEL_ORDER: Lazy<[Festival; 8]> = Lazy::new(|| {
    [
        Festival::Yule,
        Festival::Imbolc,
        Festival::Ostara,
        Festival::Beltane,
        Festival::Litha,
        Festival::Lughnasadh,
        Festival::Mabon,
        Festival::Samhain,
    ]
});

/// Where `now` sits relative to the nearest Wheel-of-the-Year festival.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPosition {
    pub nearest_festival: Festival,
    /// Signed days to the nearest festival; negative means it has just passed.
    pub days_to_nearest: i64,
    /// `1.0` on the festival itself, decaying to `0.0` at the cycle's midpoint
    /// between festivals (~22-23 days).
    pub proximity: f64,
}

/// Computes the seasonal position of `now` within the Wheel of the Year.
pub fn seasonal_position_at(now: DateTime<Utc>) -> SeasonalPosition {
    let year = now.year();
    let mut best: Option<(Festival, i64)> = None;
    for y in [year - 1, year, year + 1] {
        for festival in WHEEL_ORDER.iter() {
            let (m, d) = festival.month_day();
            let Some(dt) = Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single() else {
                continue;
            };
            let delta_days = (dt - now).num_days();
            if best.map(|(_, b)| delta_days.abs() < b.abs()).unwrap_or(true) {
                best = Some((*festival, delta_days));
            }
        }
    }

    let (nearest_festival, days_to_nearest) = best.expect("wheel of the year is non-empty");
    let half_cycle = 365.25 / WHEEL_ORDER.len() as f64 / 2.0;
    let proximity = (1.0 - (days_to_nearest.abs() as f64 / half_cycle)).clamp(0.0, 1.0);

    SeasonalPosition {
        nearest_festival,
        days_to_nearest,
        proximity,
    }
}

/// Number of whole calendar days (UTC) between two timestamps, used to gate
/// once-per-day checks (sealed clock, shedding sequence advance).
pub fn calendar_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later.date_naive() - earlier.date_naive()).num_days()
}

pub fn days_since(reference: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now - reference
}
