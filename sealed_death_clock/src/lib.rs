//! A tamper-evident mortality clock.
//!
//! At genesis the automaton is assigned a trigger date and a dying-duration
//! (how many days the Senescence/Legacy/Shedding arc takes once triggered),
//! drawn at random and sealed behind salted SHA-256 commitments. The
//! plaintext date and duration are never persisted — only the commitments,
//! the salt, and (once a daily check matches) the values the match itself
//! reveals. A caller can later audit the clock by supplying a candidate
//! plaintext date/duration and asking whether it matches the sealed hashes,
//! without the clock ever having stored that plaintext itself.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use error_types::{LifecycleError, Result};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Candidate dying-duration range, in days, considered at seal time.
pub const DURATION_CANDIDATES: std::ops::RangeInclusive<u32> = 2..=7;

/// Mean length of a synodic lunar month, in days.
const LUNAR_CYCLE_DAYS: f64 = 29.530_589;

/// The trigger date is sampled uniformly from `[13*P, 16*P)` days after
/// birth, i.e. somewhere in lunar cycles 13 through 15 inclusive.
const TRIGGER_WINDOW_DAYS_MIN: f64 = 13.0 * LUNAR_CYCLE_DAYS;
const TRIGGER_WINDOW_DAYS_MAX: f64 = 16.0 * LUNAR_CYCLE_DAYS;

/// The lunar cycle at which a daily check first starts testing for a match.
/// Below this the check short-circuits without hashing anything.
const EARLIEST_CHECK_CYCLE: u32 = 13;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedDeathClock {
    death_date_hash: String,
    dying_duration_hash: String,
    salt: [u8; 32],
    pub sealed_at: DateTime<Utc>,
    pub triggered: bool,
    pub triggered_at_cycle: Option<u32>,
    /// The instant the daily check matched `deathDateHash`. Not part of the
    /// spec's minimal field list, but needed by consumers (e.g. the
    /// degradation curve) that anchor a dying-arc reading to a concrete
    /// timestamp rather than just a cycle number.
    pub triggered_at: Option<DateTime<Utc>>,
    /// Revealed only once `triggered` is true.
    pub dying_duration_days: Option<u32>,
}

/// Result of a daily (or ad hoc) check against the sealed clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockCheckOutcome {
    Inactive,
    Active {
        onset_cycle: u32,
        curve_steepness: f64,
    },
}

/// Result of an audit against externally supplied plaintext guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockVerification {
    pub date_valid: bool,
    pub duration_valid: bool,
}

impl ClockVerification {
    pub fn both_valid(&self) -> bool {
        self.date_valid && self.duration_valid
    }
}

impl SealedDeathClock {
    /// Seal a new clock anchored at `birth`. The sampled date and duration
    /// are hashed and discarded; nothing plaintext survives this call.
    pub fn generate(birth: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let offset_days = rng.gen_range(TRIGGER_WINDOW_DAYS_MIN..TRIGGER_WINDOW_DAYS_MAX);
        let trigger_date = (birth + Duration::seconds((offset_days * 86_400.0).round() as i64))
            .date_naive();
        let dying_duration_days = rng.gen_range(DURATION_CANDIDATES);

        let mut salt = [0u8; 32];
        rng.fill_bytes(&mut salt);

        let death_date_hash = commitment(&salt, &date_string(trigger_date));
        let dying_duration_hash = commitment(&salt, &duration_string(dying_duration_days));

        SealedDeathClock {
            death_date_hash,
            dying_duration_hash,
            salt,
            sealed_at: birth,
            triggered: false,
            triggered_at_cycle: None,
            triggered_at: None,
            dying_duration_days: None,
        }
    }

    /// Test-only constructor that returns the sealed clock together with the
    /// plaintext date/duration it would otherwise discard, so tests can drive
    /// [`SealedDeathClock::verify`] without brute-forcing the commitment
    /// themselves.
    #[doc(hidden)]
    pub fn generate_with_plaintext(birth: DateTime<Utc>) -> (Self, String, u32) {
        let mut rng = rand::thread_rng();
        let offset_days = rng.gen_range(TRIGGER_WINDOW_DAYS_MIN..TRIGGER_WINDOW_DAYS_MAX);
        let trigger_date = (birth + Duration::seconds((offset_days * 86_400.0).round() as i64))
            .date_naive();
        let dying_duration_days = rng.gen_range(DURATION_CANDIDATES);

        let mut salt = [0u8; 32];
        rng.fill_bytes(&mut salt);

        let date_str = date_string(trigger_date);
        let death_date_hash = commitment(&salt, &date_str);
        let dying_duration_hash = commitment(&salt, &duration_string(dying_duration_days));

        let clock = SealedDeathClock {
            death_date_hash,
            dying_duration_hash,
            salt,
            sealed_at: birth,
            triggered: false,
            triggered_at_cycle: None,
            triggered_at: None,
            dying_duration_days: None,
        };
        (clock, date_str, dying_duration_days)
    }

    /// Idempotent daily check. `current_cycle` is the caller's externally
    /// computed lunar cycle number (see `lifecycle_clock::lunar_position_at`)
    /// since birth. Mutates `self` to persist the reveal the first time the
    /// check matches.
    pub fn daily_check(&mut self, now: DateTime<Utc>, current_cycle: u32) -> Result<ClockCheckOutcome> {
        if self.triggered {
            return Ok(ClockCheckOutcome::Active {
                onset_cycle: self.triggered_at_cycle.unwrap_or(current_cycle),
                curve_steepness: self
                    .dying_duration_days
                    .map(curve_steepness_for_duration)
                    .unwrap_or(0.0),
            });
        }

        if current_cycle < EARLIEST_CHECK_CYCLE {
            return Ok(ClockCheckOutcome::Inactive);
        }

        let today = date_string(now.date_naive());
        if commitment(&self.salt, &today) != self.death_date_hash {
            return Ok(ClockCheckOutcome::Inactive);
        }

        let revealed_duration = DURATION_CANDIDATES
            .find(|d| commitment(&self.salt, &duration_string(*d)) == self.dying_duration_hash)
            .ok_or(LifecycleError::DeathClockCorrupted)?;

        self.triggered = true;
        self.triggered_at_cycle = Some(current_cycle);
        self.triggered_at = Some(now);
        self.dying_duration_days = Some(revealed_duration);

        Ok(ClockCheckOutcome::Active {
            onset_cycle: current_cycle,
            curve_steepness: curve_steepness_for_duration(revealed_duration),
        })
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// The moment death completes, once both the trigger and the duration
    /// have been revealed by a matching daily check.
    pub fn death_at(&self) -> Option<DateTime<Utc>> {
        let triggered_at = self.triggered_at?;
        let duration = self.dying_duration_days?;
        Some(triggered_at + Duration::days(duration as i64))
    }

    /// Post-mortem audit: does the supplied plaintext `date` (UTC,
    /// `YYYY-MM-DD`) and `duration` match the sealed commitments? Each field
    /// is checked independently so a caller can tell which one, if either,
    /// was tampered with.
    pub fn verify(&self, date: &str, duration: u32) -> ClockVerification {
        ClockVerification {
            date_valid: commitment(&self.salt, date) == self.death_date_hash,
            duration_valid: commitment(&self.salt, &duration_string(duration)) == self.dying_duration_hash,
        }
    }
}

fn curve_steepness_for_duration(duration_days: u32) -> f64 {
    match duration_days {
        2 => 0.8,
        3 => 0.6,
        4 => 0.4,
        5 => 0.3,
        6 => 0.2,
        7 => 0.15,
        _ => 0.0,
    }
}

fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn duration_string(duration_days: u32) -> String {
    duration_days.to_string()
}

fn commitment(salt: &[u8; 32], value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(b":");
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
