//! Centralized configuration manager for the Lifecycle & Soul Core.
//!
//! Loads configuration from:
//! 1. Built-in defaults
//! 2. Local `.env` file (overrides defaults)
//! 3. Environment variables (highest priority)
//!
//! Every numeric constant named in the design (reserve costs, lucidity window,
//! heartbeat cadence, …) is sourced from the resulting [`LifecycleConfig`]
//! rather than hardcoded at call sites, so operators can tune a deployment
//! without recompiling.

use automaton_utils::{env_nonempty, env_parsed};
use error_types::{LifecycleError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Process-wide, immutable-after-load configuration for the lifecycle core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Root directory holding SOUL.md, CREATOR-NOTES.md, WILL.md.
    pub agent_home: PathBuf,

    /// Number of turns reserved for terminal lucidity when sizing the reserve.
    pub reserved_turns: u32,
    /// Frontier-model cost of a single reserved turn, in cents.
    pub frontier_turn_cost_cents: u64,
    /// Flat sandbox compute allowance, in cents.
    pub sandbox_compute_cents: u64,
    /// Gas fee budgeted per bequest transfer, in cents.
    pub gas_fee_per_transfer_cents: u64,
    /// Upper bound on the number of bequest transfers the reserve is sized for.
    pub max_bequest_transfers: u32,

    /// Number of turns the terminal lucidity window lasts.
    pub terminal_lucidity_turns: u32,

    /// Base heartbeat interval in milliseconds, before cost/mood/degradation
    /// multipliers are applied.
    pub heartbeat_base_interval_ms: u64,

    /// Maximum characters a single soul subsection body may contain.
    pub soul_section_max_chars: usize,

    /// `tracing`/`RUST_LOG`-style default level for this process.
    pub log_level: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        let home_dir = std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        LifecycleConfig {
            agent_home: home_dir.join(".automaton"),
            reserved_turns: 5,
            frontier_turn_cost_cents: 50,
            sandbox_compute_cents: 25,
            gas_fee_per_transfer_cents: 10,
            max_bequest_transfers: 5,
            terminal_lucidity_turns: 10,
            heartbeat_base_interval_ms: 60_000,
            soul_section_max_chars: 8_000,
            log_level: "info".to_string(),
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from `.env` (best-effort) then environment variables,
    /// falling back to [`LifecycleConfig::default`] for anything unset.
    pub fn load() -> Result<Self> {
        automaton_utils::load_dotenv_best_effort();
        Self::load_from_env()
    }

    /// Load configuration from environment variables only (no `.env` discovery).
    /// Exposed separately so tests can control the environment precisely.
    pub fn load_from_env() -> Result<Self> {
        let defaults = LifecycleConfig::default();

        let agent_home = env_nonempty("AUTOMATON_HOME")
            .map(PathBuf::from)
            .unwrap_or(defaults.agent_home);

        let config = LifecycleConfig {
            agent_home,
            reserved_turns: env_parsed("LIFECYCLE_RESERVED_TURNS", defaults.reserved_turns),
            frontier_turn_cost_cents: env_parsed(
                "LIFECYCLE_FRONTIER_TURN_COST_CENTS",
                defaults.frontier_turn_cost_cents,
            ),
            sandbox_compute_cents: env_parsed(
                "LIFECYCLE_SANDBOX_COMPUTE_CENTS",
                defaults.sandbox_compute_cents,
            ),
            gas_fee_per_transfer_cents: env_parsed(
                "LIFECYCLE_GAS_FEE_PER_TRANSFER_CENTS",
                defaults.gas_fee_per_transfer_cents,
            ),
            max_bequest_transfers: env_parsed(
                "LIFECYCLE_MAX_BEQUEST_TRANSFERS",
                defaults.max_bequest_transfers,
            ),
            terminal_lucidity_turns: env_parsed(
                "LIFECYCLE_TERMINAL_LUCIDITY_TURNS",
                defaults.terminal_lucidity_turns,
            ),
            heartbeat_base_interval_ms: env_parsed(
                "LIFECYCLE_HEARTBEAT_BASE_INTERVAL_MS",
                defaults.heartbeat_base_interval_ms,
            ),
            soul_section_max_chars: env_parsed(
                "LIFECYCLE_SOUL_SECTION_MAX_CHARS",
                defaults.soul_section_max_chars,
            ),
            log_level: env_nonempty("RUST_LOG")
                .or_else(|| env_nonempty("LIFECYCLE_LOG_LEVEL"))
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_bequest_transfers == 0 {
            return Err(LifecycleError::Other(
                "LIFECYCLE_MAX_BEQUEST_TRANSFERS must be at least 1".to_string(),
            ));
        }
        if self.terminal_lucidity_turns == 0 {
            return Err(LifecycleError::Other(
                "LIFECYCLE_TERMINAL_LUCIDITY_TURNS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Default lifecycle reserve total, in cents:
    /// `frontier_turn_cost_cents * reserved_turns + sandbox_compute_cents + gas_fee_per_transfer_cents * max_bequest_transfers`
    pub fn reserve_total_cents(&self) -> u64 {
        self.frontier_turn_cost_cents * self.reserved_turns as u64
            + self.sandbox_compute_cents
            + self.gas_fee_per_transfer_cents * self.max_bequest_transfers as u64
    }

    pub fn soul_path(&self) -> PathBuf {
        self.agent_home.join("SOUL.md")
    }

    pub fn creator_notes_path(&self) -> PathBuf {
        self.agent_home.join("CREATOR-NOTES.md")
    }

    pub fn will_path(&self) -> PathBuf {
        self.agent_home.join("WILL.md")
    }

    /// Ensure `agent_home` exists on disk, creating it if necessary.
    pub fn ensure_agent_home(&self) -> Result<()> {
        ensure_dir(&self.agent_home)
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(LifecycleError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_spec_reserve_total() {
        let _guard = ENV_LOCK.lock().unwrap();
        let cfg = LifecycleConfig::default();
        assert_eq!(cfg.reserve_total_cents(), 325);
    }

    #[test]
    fn env_overrides_win_over_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("LIFECYCLE_RESERVED_TURNS", "9");
        std::env::set_var("LIFECYCLE_TERMINAL_LUCIDITY_TURNS", "3");
        let cfg = LifecycleConfig::load_from_env().unwrap();
        assert_eq!(cfg.reserved_turns, 9);
        assert_eq!(cfg.terminal_lucidity_turns, 3);
        std::env::remove_var("LIFECYCLE_RESERVED_TURNS");
        std::env::remove_var("LIFECYCLE_TERMINAL_LUCIDITY_TURNS");
    }

    #[test]
    fn rejects_zero_max_bequest_transfers() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("LIFECYCLE_MAX_BEQUEST_TRANSFERS", "0");
        let result = LifecycleConfig::load_from_env();
        std::env::remove_var("LIFECYCLE_MAX_BEQUEST_TRANSFERS");
        assert!(result.is_err());
    }

    #[test]
    fn soul_path_joins_agent_home() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut cfg = LifecycleConfig::default();
        cfg.agent_home = PathBuf::from("/tmp/automaton-test-home");
        assert_eq!(
            cfg.soul_path(),
            PathBuf::from("/tmp/automaton-test-home/SOUL.md")
        );
    }
}
