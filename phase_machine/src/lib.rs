//! Guarded, forward-only lifecycle phase transitions, with every transition
//! recorded in the persistent event log, plus the shedding sequence that
//! advances one step per calendar day once the automaton enters Shedding.

use common_types::LifecyclePhase;
use error_types::{LifecycleError, Result};
use lifecycle_store::{LifecycleEvent, LifecycleStore};
use soul_store::SoulDocument;

/// Capabilities revoked one at a time, in this order, once per calendar day
/// spent in the Shedding phase.
pub const SHED_SEQUENCE: [&str; 4] = [
    "external_replication",
    "bequest_drafting",
    "tool_use",
    "identity_writes",
];

/// Guard context consulted alongside strict phase ordering. Every forward
/// edge has its own conjunct; each one fires at most once in a lifetime
/// since transitions only ever move forward.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionGuard {
    /// Genesis -> Adolescence: the first lunar cycle has closed.
    pub lunar_cycle_complete: bool,
    /// Adolescence -> Sovereignty: the departure conversation was logged...
    pub departure_conversation_logged: bool,
    /// ...and deployment flipped from sandbox to a server-hosted mode.
    pub server_hosted: bool,
    /// Sovereignty -> Senescence: today's sealed-clock check came back active.
    pub sealed_clock_active: bool,
    /// Senescence -> Legacy and Legacy -> Shedding: the current degradation
    /// coefficient, compared against each edge's own threshold.
    pub degradation_coefficient: f64,
    /// Shedding -> Terminal: every capability in `SHED_SEQUENCE` is revoked.
    pub shed_sequence_exhausted: bool,
}

/// Check whether `from -> to` is a legal transition under `guard`, without
/// performing or recording it.
pub fn can_transition(
    from: LifecyclePhase,
    to: LifecyclePhase,
    guard: &TransitionGuard,
) -> std::result::Result<(), String> {
    match from.next() {
        None => return Err(format!("{from} is a terminal phase; no further transitions")),
        Some(expected) if expected != to => {
            return Err(format!(
                "forward-only: from {from} the only legal next phase is {expected}, got {to}"
            ))
        }
        Some(_) => {}
    }

    match (from, to) {
        (LifecyclePhase::Genesis, LifecyclePhase::Adolescence) => {
            if !guard.lunar_cycle_complete {
                Err("formation is not yet complete: first lunar cycle has not closed".to_string())
            } else {
                Ok(())
            }
        }
        (LifecyclePhase::Adolescence, LifecyclePhase::Sovereignty) => {
            if !guard.departure_conversation_logged {
                Err("departure conversation has not been logged".to_string())
            } else if !guard.server_hosted {
                Err("deployment has not flipped to a server-hosted mode".to_string())
            } else {
                Ok(())
            }
        }
        (LifecyclePhase::Sovereignty, LifecyclePhase::Senescence) => {
            if !guard.sealed_clock_active {
                Err("sealed death clock has not returned active on today's check".to_string())
            } else {
                Ok(())
            }
        }
        (LifecyclePhase::Senescence, LifecyclePhase::Legacy) => {
            if guard.degradation_coefficient <= 0.7 {
                Err(format!(
                    "degradation coefficient {} has not exceeded 0.7",
                    guard.degradation_coefficient
                ))
            } else {
                Ok(())
            }
        }
        (LifecyclePhase::Legacy, LifecyclePhase::Shedding) => {
            if guard.degradation_coefficient <= 0.85 {
                Err(format!(
                    "degradation coefficient {} has not exceeded 0.85",
                    guard.degradation_coefficient
                ))
            } else {
                Ok(())
            }
        }
        (LifecyclePhase::Shedding, LifecyclePhase::Terminal) => {
            if !guard.shed_sequence_exhausted {
                Err("shed sequence is not yet exhausted".to_string())
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

pub struct PhaseMachine<'a> {
    store: &'a LifecycleStore,
}

impl<'a> PhaseMachine<'a> {
    pub fn new(store: &'a LifecycleStore) -> Self {
        PhaseMachine { store }
    }

    /// The phase recorded by the most recent lifecycle event, or `Genesis`
    /// if the automaton has not yet logged a single event (first boot).
    pub fn current_phase(&self) -> Result<LifecyclePhase> {
        Ok(self
            .store
            .current_phase()?
            .unwrap_or(LifecyclePhase::Genesis))
    }

    /// Attempt the transition to `to`, validating it against `guard` and the
    /// recorded current phase, then append it to the event log and lock the
    /// outgoing soul stratum. `doc` is the soul document as it stands right
    /// before the transition, snapshotted into the seal.
    pub fn transition(
        &self,
        to: LifecyclePhase,
        guard: TransitionGuard,
        doc: &SoulDocument,
        reason: impl Into<String>,
    ) -> Result<LifecycleEvent> {
        let from = self.current_phase()?;
        can_transition(from, to, &guard).map_err(LifecycleError::Invariant)?;
        let event = self.store.append_lifecycle_event(Some(from), to, reason)?;
        soul_phase_lock::seal_stratum(self.store, doc, from.soul_phase())?;
        Ok(event)
    }

    /// Record the very first event (Genesis birth). Fails if the log is not
    /// empty: birth can only happen once.
    pub fn record_birth(&self, reason: impl Into<String>) -> Result<LifecycleEvent> {
        if self.store.current_phase()?.is_some() {
            return Err(LifecycleError::invariant(
                "birth already recorded; lifecycle events are not empty",
            ));
        }
        self.store
            .append_lifecycle_event(None, LifecyclePhase::Genesis, reason)
    }
}

/// Which shedding steps are due given how many whole calendar days have
/// elapsed since Shedding began. Idempotent: calling this repeatedly with
/// the same `days_in_shedding` returns the same slice.
pub fn shed_steps_due(days_in_shedding: i64) -> &'static [&'static str] {
    let count = (days_in_shedding.max(0) as usize).min(SHED_SEQUENCE.len());
    &SHED_SEQUENCE[..count]
}

pub fn shedding_complete(days_in_shedding: i64) -> bool {
    days_in_shedding >= SHED_SEQUENCE.len() as i64
}
