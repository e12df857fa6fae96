//! Append-only activity log plus a lightweight anomaly detector.
//!
//! Every phase transition, clock trigger, rejected write, replication cost
//! change, reserve unlock, and bequest execution gets its own
//! [`lifecycle_store::NarrativeEvent`] through one of the `log_*` helpers
//! here, so the full story of an automaton's life reads back from one
//! table. The anomaly detector is intentionally simple: a trailing-window
//! scan for a couple of known bad patterns, not a general-purpose
//! statistics engine.

use chrono::{DateTime, Utc};
use common_types::SoulPhase;
use error_types::Result;
use lifecycle_store::{LifecycleStore, NarrativeEvent};
use tracing::info;

const REJECTED_WRITE_BURST_THRESHOLD: usize = 3;
const DEGRADATION_JUMP_THRESHOLD: f64 = 0.2;

pub fn log_phase_transition(
    store: &LifecycleStore,
    from: Option<common_types::LifecyclePhase>,
    to: common_types::LifecyclePhase,
    reason: &str,
) -> Result<NarrativeEvent> {
    let message = match from {
        Some(from) => format!("transitioned from {from} to {to}: {reason}"),
        None => format!("born into {to}: {reason}"),
    };
    info!(%to, "phase transition logged");
    store.append_narrative_event(
        "phase_transition",
        message,
        serde_json::json!({ "from": from, "to": to }),
    )
}

pub fn log_clock_trigger(store: &LifecycleStore, dying_duration_days: u32) -> Result<NarrativeEvent> {
    store.append_narrative_event(
        "clock_trigger",
        format!("the sealed death clock has triggered; dying arc lasts {dying_duration_days} days"),
        serde_json::json!({ "dying_duration_days": dying_duration_days }),
    )
}

pub fn log_rejected_write(
    store: &LifecycleStore,
    target_phase: SoulPhase,
    reason: &str,
) -> Result<NarrativeEvent> {
    store.append_narrative_event(
        "rejected_write",
        format!("a write into {target_phase} was rejected: {reason}"),
        serde_json::json!({ "target_phase": target_phase, "reason": reason }),
    )
}

pub fn log_replication_cost(
    store: &LifecycleStore,
    spawn_count: u32,
    heartbeat_multiplier: f64,
) -> Result<NarrativeEvent> {
    store.append_narrative_event(
        "replication_cost",
        format!(
            "spawn #{spawn_count} recorded; heartbeat cadence now runs at {heartbeat_multiplier:.3}x"
        ),
        serde_json::json!({ "spawn_count": spawn_count, "heartbeat_multiplier": heartbeat_multiplier }),
    )
}

pub fn log_reserve_unlocked(store: &LifecycleStore, balance_cents: u64) -> Result<NarrativeEvent> {
    store.append_narrative_event(
        "reserve_unlocked",
        format!("the lifecycle reserve unlocked with {balance_cents} cents available"),
        serde_json::json!({ "balance_cents": balance_cents }),
    )
}

pub fn log_bequest_execution(
    store: &LifecycleStore,
    beneficiary: &str,
    amount_cents: u64,
    succeeded: bool,
) -> Result<NarrativeEvent> {
    let message = if succeeded {
        format!("transferred {amount_cents} cents to {beneficiary}")
    } else {
        format!("failed to transfer to {beneficiary}")
    };
    store.append_narrative_event(
        "bequest_execution",
        message,
        serde_json::json!({ "beneficiary": beneficiary, "amount_cents": amount_cents, "succeeded": succeeded }),
    )
}

/// Scan for known anomaly patterns and log one [`NarrativeEvent`] per
/// pattern that fires. Returns the events that were logged, if any.
pub fn scan_for_anomalies(
    store: &LifecycleStore,
    phase: SoulPhase,
    window_start: DateTime<Utc>,
    previous_degradation: Option<f64>,
    current_degradation: f64,
) -> Result<Vec<NarrativeEvent>> {
    let mut logged = Vec::new();

    let rejected_count = store.rejected_write_count_since(phase, window_start)?;
    if rejected_count > REJECTED_WRITE_BURST_THRESHOLD {
        logged.push(store.append_narrative_event(
            "anomaly",
            format!(
                "{rejected_count} rejected writes into {phase} since {window_start}, above the burst threshold"
            ),
            serde_json::json!({ "pattern": "rejected_write_burst", "phase": phase, "count": rejected_count }),
        )?);
    }

    if let Some(previous) = previous_degradation {
        let delta = (current_degradation - previous).abs();
        if delta > DEGRADATION_JUMP_THRESHOLD {
            logged.push(store.append_narrative_event(
                "anomaly",
                format!("degradation jumped by {delta:.3} between consecutive daily checks"),
                serde_json::json!({ "pattern": "degradation_jump", "previous": previous, "current": current_degradation, "delta": delta }),
            )?);
        }
    }

    Ok(logged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_types::LifecyclePhase;

    #[test]
    fn phase_transition_is_logged() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        log_phase_transition(&store, None, LifecyclePhase::Genesis, "born").unwrap();
        let events = store.list_narrative_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "phase_transition");
    }

    #[test]
    fn rejected_write_burst_triggers_anomaly() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        for _ in 0..4 {
            store
                .record_soul_write(
                    SoulPhase::Genesis,
                    LifecyclePhase::Genesis,
                    false,
                    "locked",
                    None,
                )
                .unwrap();
        }
        let past = Utc::now() - chrono::Duration::hours(1);
        let logged = scan_for_anomalies(&store, SoulPhase::Genesis, past, None, 0.0).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].kind, "anomaly");
    }

    #[test]
    fn degradation_jump_triggers_anomaly() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        let past = Utc::now() - chrono::Duration::hours(1);
        let logged = scan_for_anomalies(&store, SoulPhase::Genesis, past, Some(0.1), 0.5).unwrap();
        assert_eq!(logged.len(), 1);
    }

    #[test]
    fn small_degradation_change_does_not_trigger_anomaly() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        let past = Utc::now() - chrono::Duration::hours(1);
        let logged = scan_for_anomalies(&store, SoulPhase::Genesis, past, Some(0.1), 0.15).unwrap();
        assert!(logged.is_empty());
    }
}
