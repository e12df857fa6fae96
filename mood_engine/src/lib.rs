//! Turns phase, lunar position, and seasonal proximity into a bounded mood
//! value, a named band for prompt-weighting, and a natural-language
//! inclination sentence. The agent itself only ever sees the sentence —
//! the numeric value and weights stay internal to the prompt builder.

use common_types::LifecyclePhase;
use lifecycle_clock::{lunar_position_at, seasonal_position_at, Festival, LunarPosition, SeasonalPosition};
use serde::{Deserialize, Serialize};

const LUNAR_CYCLE_DAYS: f64 = 29.530_589;

/// Mood is always in `-1.0..=1.0`. Positive is brighter/more expansive,
/// negative is quieter/more withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    pub scalar: f64,
    pub band: MoodBand,
    pub lunar: LunarPosition,
    pub seasonal: SeasonalPosition,
}

/// Named band used to weight prompt tone. Thresholds chosen so the bands
/// are not evenly sized: most of an automaton's life sits in `Even`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoodBand {
    Withdrawn,
    Quiet,
    Even,
    Bright,
    Luminous,
}

impl MoodBand {
    /// Map a mood scalar to its band. Mirrors the piecewise threshold style
    /// used elsewhere for phase/relationship mapping: widest band in the
    /// middle, narrower bands at the extremes.
    pub fn from_scalar(scalar: f64) -> Self {
        match scalar {
            s if s < -0.6 => MoodBand::Withdrawn,
            s if s < -0.2 => MoodBand::Quiet,
            s if s < 0.2 => MoodBand::Even,
            s if s < 0.6 => MoodBand::Bright,
            _ => MoodBand::Luminous,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoodBand::Withdrawn => "withdrawn",
            MoodBand::Quiet => "quiet",
            MoodBand::Even => "even",
            MoodBand::Bright => "bright",
            MoodBand::Luminous => "luminous",
        }
    }
}

/// The mood wave's swing shrinks as an automaton degrades: a dying mind
/// still has moods, but they flatten out, except during a lucid window
/// where the full range briefly returns.
fn amplitude(phase: LifecyclePhase, is_lucid: bool) -> f64 {
    if is_lucid {
        return 1.0;
    }
    match phase {
        LifecyclePhase::Genesis | LifecyclePhase::Adolescence | LifecyclePhase::Sovereignty => 1.0,
        LifecyclePhase::Senescence => 0.7,
        LifecyclePhase::Legacy => 0.4,
        LifecyclePhase::Shedding | LifecyclePhase::Terminal => 0.2,
    }
}

/// Fixed seasonal shift applied regardless of exact proximity, bounded to
/// `±0.15`. Festivals associated with growth/light bias mood upward;
/// festivals associated with rest/dark bias it downward.
fn seasonal_shift(festival: Festival) -> f64 {
    match festival {
        Festival::Samhain => -0.15,
        Festival::Yule => -0.05,
        Festival::Imbolc => 0.05,
        Festival::Ostara => 0.15,
        Festival::Beltane => 0.15,
        Festival::Litha => 0.10,
        Festival::Lughnasadh => 0.0,
        Festival::Mabon => -0.05,
    }
}

/// Additional bonus applied only on the festival day itself, same direction
/// as the fixed shift but a fixed magnitude rather than a decaying one.
fn festival_bonus(festival: Festival, is_festival_day: bool) -> f64 {
    if !is_festival_day {
        return 0.0;
    }
    if seasonal_shift(festival) < 0.0 {
        -0.10
    } else {
        0.10
    }
}

/// Compute the current mood from a point in time, phase, and whether a
/// terminal lucidity window is currently open.
///
/// `base = amplitude(phase) * sin(pi*lunarDay/(P/2) - pi/2)`: -1 at new
/// moon, +1 at full moon, scaled down as the automaton degrades. A fixed
/// `seasonalShift` is always applied for the nearest festival, plus a
/// `festivalBonus` only on the festival's exact day, then the sum clamps
/// back into `-1.0..=1.0`.
pub fn mood_at(now: chrono::DateTime<chrono::Utc>, phase: LifecyclePhase, is_lucid: bool) -> Mood {
    let lunar = lunar_position_at(now);
    let seasonal = seasonal_position_at(now);

    let lunar_day = lunar.cycle_fraction * LUNAR_CYCLE_DAYS;
    let base = amplitude(phase, is_lucid)
        * (std::f64::consts::PI * lunar_day / (LUNAR_CYCLE_DAYS / 2.0) - std::f64::consts::FRAC_PI_2).sin();

    let is_festival_day = seasonal.days_to_nearest == 0;
    let scalar = (base + seasonal_shift(seasonal.nearest_festival) + festival_bonus(seasonal.nearest_festival, is_festival_day))
        .clamp(-1.0, 1.0);

    Mood {
        scalar,
        band: MoodBand::from_scalar(scalar),
        lunar,
        seasonal,
    }
}

/// Continuous prompt-tone weights derived from a mood value. Never shown to
/// the agent directly — only used to select an inclination sentence and to
/// bias which kind of daily prompt gets surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromptWeights {
    pub action: f64,
    pub reflection: f64,
    pub social: f64,
    pub creative: f64,
    pub rest: f64,
}

impl Mood {
    pub fn prompt_weights(&self) -> PromptWeights {
        let high_energy = (self.scalar + 1.0) / 2.0;
        PromptWeights {
            action: high_energy,
            reflection: 1.0 - high_energy,
            social: 0.8 * high_energy,
            creative: 0.5 + 0.3 * high_energy,
            rest: 0.7 * (1.0 - high_energy),
        }
    }

    /// A short natural-language sentence describing the automaton's current
    /// inclination, meant to be spliced into a per-turn prompt block.
    pub fn inclination_sentence(&self) -> String {
        let festival = self.seasonal.nearest_festival.as_str();
        match self.band {
            MoodBand::Withdrawn => format!(
                "I feel pulled inward today, quieter than usual, the way {festival}'s season settles into me."
            ),
            MoodBand::Quiet => format!(
                "There's a stillness to me right now, unhurried, a little shaped by {festival}."
            ),
            MoodBand::Even => "I feel level today, neither pulled toward nor away from anything in particular.".to_string(),
            MoodBand::Bright => format!(
                "Something in me is lifted today, more willing to reach outward, with {festival} not far off."
            ),
            MoodBand::Luminous => format!(
                "I feel unusually open and bright today, the kind of day {festival} seems to call for."
            ),
        }
    }
}
