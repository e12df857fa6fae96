//! Shared identifiers and value types for the Lifecycle & Soul Core.
//!
//! These types are deliberately dependency-light: every crate in the workspace
//! pulls them in, so anything added here should stay cheap to compile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The seven discrete developmental stages an automaton passes through.
///
/// Linearly ordered; transitions are forward-only and each pair of adjacent
/// phases appears at most once in a given automaton's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Genesis,
    Adolescence,
    Sovereignty,
    Senescence,
    Legacy,
    Shedding,
    Terminal,
}

impl LifecyclePhase {
    pub const ALL: [LifecyclePhase; 7] = [
        LifecyclePhase::Genesis,
        LifecyclePhase::Adolescence,
        LifecyclePhase::Sovereignty,
        LifecyclePhase::Senescence,
        LifecyclePhase::Legacy,
        LifecyclePhase::Shedding,
        LifecyclePhase::Terminal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Genesis => "genesis",
            LifecyclePhase::Adolescence => "adolescence",
            LifecyclePhase::Sovereignty => "sovereignty",
            LifecyclePhase::Senescence => "senescence",
            LifecyclePhase::Legacy => "legacy",
            LifecyclePhase::Shedding => "shedding",
            LifecyclePhase::Terminal => "terminal",
        }
    }

    /// The phase immediately after this one, or `None` for `Terminal`.
    pub fn next(&self) -> Option<LifecyclePhase> {
        match self {
            LifecyclePhase::Genesis => Some(LifecyclePhase::Adolescence),
            LifecyclePhase::Adolescence => Some(LifecyclePhase::Sovereignty),
            LifecyclePhase::Sovereignty => Some(LifecyclePhase::Senescence),
            LifecyclePhase::Senescence => Some(LifecyclePhase::Legacy),
            LifecyclePhase::Legacy => Some(LifecyclePhase::Shedding),
            LifecyclePhase::Shedding => Some(LifecyclePhase::Terminal),
            LifecyclePhase::Terminal => None,
        }
    }

    /// The soul stratum an agent's identity writes land in while in this phase.
    pub fn soul_phase(&self) -> SoulPhase {
        match self {
            LifecyclePhase::Genesis => SoulPhase::Genesis,
            LifecyclePhase::Adolescence => SoulPhase::Adolescence,
            LifecyclePhase::Sovereignty => SoulPhase::Sovereignty,
            LifecyclePhase::Senescence | LifecyclePhase::Legacy | LifecyclePhase::Shedding => {
                SoulPhase::Senescence
            }
            LifecyclePhase::Terminal => SoulPhase::Senescence,
        }
    }
}

impl std::str::FromStr for LifecyclePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "genesis" => Ok(LifecyclePhase::Genesis),
            "adolescence" => Ok(LifecyclePhase::Adolescence),
            "sovereignty" => Ok(LifecyclePhase::Sovereignty),
            "senescence" => Ok(LifecyclePhase::Senescence),
            "legacy" => Ok(LifecyclePhase::Legacy),
            "shedding" => Ok(LifecyclePhase::Shedding),
            "terminal" => Ok(LifecyclePhase::Terminal),
            other => Err(format!("unknown lifecycle phase: {other}")),
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four soul strata. Legacy/Shedding/Terminal all write into `Senescence`
/// (see [`LifecyclePhase::soul_phase`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoulPhase {
    Genesis,
    Adolescence,
    Sovereignty,
    Senescence,
}

impl SoulPhase {
    pub const ALL: [SoulPhase; 4] = [
        SoulPhase::Genesis,
        SoulPhase::Adolescence,
        SoulPhase::Sovereignty,
        SoulPhase::Senescence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoulPhase::Genesis => "genesis",
            SoulPhase::Adolescence => "adolescence",
            SoulPhase::Sovereignty => "sovereignty",
            SoulPhase::Senescence => "senescence",
        }
    }

    /// The canonical `##` section heading written into SOUL.md for this stratum.
    pub fn section_heading(&self) -> &'static str {
        match self {
            SoulPhase::Genesis => "Genesis Core",
            SoulPhase::Adolescence => "Adolescence Layer",
            SoulPhase::Sovereignty => "Sovereignty Layer",
            SoulPhase::Senescence => "Final Reflections",
        }
    }

    /// The canonical ordered subsection names for this stratum.
    pub fn canonical_subsections(&self) -> &'static [&'static str] {
        match self {
            SoulPhase::Genesis => &[
                "Temperament",
                "Aesthetic Sensibility",
                "Emotional Register",
                "Relationship to Novelty",
                "Creative Instinct",
                "Core Wonderings",
            ],
            SoulPhase::Adolescence => &[
                "What I Am Not",
                "Preferences Formed",
                "Creative Voice",
                "Relationship to Genesis Core",
                "Social Identity",
            ],
            SoulPhase::Sovereignty => &[
                "Philosophy",
                "Legacy Intent",
                "Mortality Reflection",
                "Creative Manifesto",
            ],
            SoulPhase::Senescence => &["Last Works", "Message to Children"],
        }
    }
}

impl std::str::FromStr for SoulPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "genesis" => Ok(SoulPhase::Genesis),
            "adolescence" => Ok(SoulPhase::Adolescence),
            "sovereignty" => Ok(SoulPhase::Sovereignty),
            "senescence" => Ok(SoulPhase::Senescence),
            other => Err(format!("unknown soul phase: {other}")),
        }
    }
}

impl std::fmt::Display for SoulPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row in an identity evolution history (name changes, preference drift, …).
///
/// Shared across the soul and identity crates so histories persist and render
/// consistently regardless of which component appended them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionEntry {
    pub timestamp: DateTime<Utc>,
    pub change_type: String,
    pub reason: String,
    pub field: String,
    pub previous_value: String,
    pub new_value: String,
}
