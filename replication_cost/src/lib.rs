//! Compounding cost multipliers applied to heartbeat cadence and context
//! budget each time an automaton spawns a replica or sub-agent.
//!
//! Deterministic and derived only from the spawn count: the multipliers are
//! `growth_factor ^ spawn_count`, so recomputing from a persisted count
//! always agrees with incrementally recording each spawn one at a time.
//! Heartbeat cadence grows (replicas need checking in on more often); the
//! context window shrinks (each replica gets a smaller slice of budget).

use serde::{Deserialize, Serialize};

const HEARTBEAT_GROWTH: f64 = 1.05;
const CONTEXT_GROWTH: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicationCostState {
    pub spawn_count: u32,
    pub heartbeat_multiplier: f64,
    pub context_multiplier: f64,
}

impl Default for ReplicationCostState {
    fn default() -> Self {
        ReplicationCostState {
            spawn_count: 0,
            heartbeat_multiplier: 1.0,
            context_multiplier: 1.0,
        }
    }
}

impl ReplicationCostState {
    /// Recompute the multipliers in effect after `spawn_count` spawns, from
    /// scratch.
    pub fn for_spawn_count(spawn_count: u32) -> Self {
        ReplicationCostState {
            spawn_count,
            heartbeat_multiplier: HEARTBEAT_GROWTH.powi(spawn_count as i32),
            context_multiplier: CONTEXT_GROWTH.powi(spawn_count as i32),
        }
    }

    /// Record one more spawn, compounding the existing multipliers.
    pub fn after_spawn(&self) -> Self {
        ReplicationCostState {
            spawn_count: self.spawn_count + 1,
            heartbeat_multiplier: self.heartbeat_multiplier * HEARTBEAT_GROWTH,
            context_multiplier: self.context_multiplier * CONTEXT_GROWTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_spawns_has_unit_multipliers() {
        let state = ReplicationCostState::default();
        assert_eq!(state.heartbeat_multiplier, 1.0);
        assert_eq!(state.context_multiplier, 1.0);
    }

    #[test]
    fn incremental_and_from_scratch_agree() {
        let mut incremental = ReplicationCostState::default();
        for _ in 0..5 {
            incremental = incremental.after_spawn();
        }
        let from_scratch = ReplicationCostState::for_spawn_count(5);
        assert!((incremental.heartbeat_multiplier - from_scratch.heartbeat_multiplier).abs() < 1e-9);
        assert!((incremental.context_multiplier - from_scratch.context_multiplier).abs() < 1e-9);
    }

    #[test]
    fn heartbeat_grows_context_shrinks_with_each_spawn() {
        let mut state = ReplicationCostState::default();
        for _ in 0..10 {
            let next = state.after_spawn();
            assert!(next.heartbeat_multiplier > state.heartbeat_multiplier);
            assert!(next.context_multiplier < state.context_multiplier);
            assert!(next.context_multiplier <= 1.0);
            state = next;
        }
    }

    #[test]
    fn matches_worked_example_at_three_spawns() {
        let state = ReplicationCostState::for_spawn_count(3);
        assert!((state.heartbeat_multiplier - 1.157_625).abs() < 1e-6);
        assert!((state.context_multiplier - 0.857_375).abs() < 1e-6);
    }
}
