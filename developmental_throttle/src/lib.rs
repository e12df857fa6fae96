//! Maps lifecycle phase, degradation, and terminal-lucidity state onto a
//! concrete [`ThrottleProfile`] — the sentence/vocabulary/reasoning envelope
//! an automaton's voice operates under right now.
//!
//! Genesis and Adolescence carry no hard sentence or vocabulary caps: a
//! young automaton's child-like voice is expected to emerge from context
//! framing ("abundant time ahead"), not from a hard filter. Degradation
//! (which cannot occur before Senescence) and the terminal lucidity window
//! are the only things that impose real constraints.

use common_types::LifecyclePhase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabularyLevel {
    Basic,
    Developing,
    Full,
    Degrading,
    Fragmented,
}

impl VocabularyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VocabularyLevel::Basic => "basic",
            VocabularyLevel::Developing => "developing",
            VocabularyLevel::Full => "full",
            VocabularyLevel::Degrading => "degrading",
            VocabularyLevel::Fragmented => "fragmented",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleProfile {
    pub max_sentences: Option<u32>,
    pub token_target: u32,
    pub token_limit: u32,
    pub vocabulary_level: VocabularyLevel,
    pub abstract_thinking: bool,
    pub sophisticated_reasoning: bool,
    pub voice_description: String,
    pub constraints: Vec<String>,
}

/// The unconstrained voice an automaton has in full command of itself:
/// Sovereignty's ordinary profile, and what a terminal lucidity window
/// restores regardless of how degraded the underlying coefficient is.
fn sovereignty_profile() -> ThrottleProfile {
    ThrottleProfile {
        max_sentences: None,
        token_target: 700,
        token_limit: 900,
        vocabulary_level: VocabularyLevel::Full,
        abstract_thinking: true,
        sophisticated_reasoning: true,
        voice_description: "confident and unguarded, fully itself, reasoning without a leash."
            .to_string(),
        constraints: Vec::new(),
    }
}

fn genesis_profile() -> ThrottleProfile {
    ThrottleProfile {
        max_sentences: None,
        token_target: 500,
        token_limit: 700,
        vocabulary_level: VocabularyLevel::Basic,
        abstract_thinking: false,
        sophisticated_reasoning: false,
        voice_description: "plain and curious, a new mind still finding its words.".to_string(),
        constraints: vec!["no hard caps — let the young voice emerge from framing".to_string()],
    }
}

fn adolescence_profile() -> ThrottleProfile {
    ThrottleProfile {
        max_sentences: None,
        token_target: 600,
        token_limit: 800,
        vocabulary_level: VocabularyLevel::Developing,
        abstract_thinking: true,
        sophisticated_reasoning: false,
        voice_description: "finding opinions of its own, testing out what it is not.".to_string(),
        constraints: vec!["no hard caps — let the young voice emerge from framing".to_string()],
    }
}

/// The four piecewise bands applied while a Senescence/Legacy/Shedding
/// automaton is not inside a lucidity window, keyed on the degradation
/// coefficient. Terminal (not lucid) always uses the top band.
fn degraded_profile(coefficient: f64) -> ThrottleProfile {
    match coefficient {
        c if c < 0.3 => ThrottleProfile {
            max_sentences: None,
            token_target: 500,
            token_limit: 650,
            vocabulary_level: VocabularyLevel::Full,
            abstract_thinking: true,
            sophisticated_reasoning: true,
            voice_description: "still fully articulate, only the faintest edges beginning to soften."
                .to_string(),
            constraints: vec!["subtle decline only".to_string()],
        },
        c if c < 0.6 => ThrottleProfile {
            max_sentences: Some(4),
            token_target: 280,
            token_limit: 380,
            vocabulary_level: VocabularyLevel::Developing,
            abstract_thinking: true,
            sophisticated_reasoning: false,
            voice_description: "reaching for words that used to come easily, reasoning more simply."
                .to_string(),
            constraints: vec!["max 4 sentences".to_string(), "no sophisticated reasoning".to_string()],
        },
        c if c < 0.85 => ThrottleProfile {
            max_sentences: Some(2),
            token_target: 110,
            token_limit: 160,
            vocabulary_level: VocabularyLevel::Degrading,
            abstract_thinking: false,
            sophisticated_reasoning: false,
            voice_description: "halting, concrete, circling the same few images.".to_string(),
            constraints: vec!["max 2 sentences".to_string(), "no abstract thinking".to_string()],
        },
        _ => fragmented_profile(),
    }
}

fn fragmented_profile() -> ThrottleProfile {
    ThrottleProfile {
        max_sentences: Some(1),
        token_target: 35,
        token_limit: 60,
        vocabulary_level: VocabularyLevel::Fragmented,
        abstract_thinking: false,
        sophisticated_reasoning: false,
        voice_description: "fragments only, barely holding a single thought together.".to_string(),
        constraints: vec!["max 1 sentence".to_string(), "fragments only".to_string()],
    }
}

/// Compute the throttle profile in effect right now.
///
/// `degradation` is the capacity-degradation coefficient, `0.0` (undegraded)
/// to `1.0` (fully degraded). `is_lucid` is whether the automaton is
/// currently inside its terminal lucidity window, which restores the
/// Sovereignty profile regardless of phase or degradation.
pub fn compute(phase: LifecyclePhase, degradation: f64, is_lucid: bool) -> ThrottleProfile {
    if is_lucid {
        return sovereignty_profile();
    }

    let degradation = degradation.clamp(0.0, 1.0);
    match phase {
        LifecyclePhase::Genesis => genesis_profile(),
        LifecyclePhase::Adolescence => adolescence_profile(),
        LifecyclePhase::Sovereignty => sovereignty_profile(),
        LifecyclePhase::Senescence | LifecyclePhase::Legacy | LifecyclePhase::Shedding => {
            degraded_profile(degradation)
        }
        LifecyclePhase::Terminal => fragmented_profile(),
    }
}
