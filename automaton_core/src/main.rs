// automaton_core/src/main.rs
//
// Unified entry point for the lifecycle and soul core: a single binary that
// can record lifecycle events, gate soul writes, run the sealed clock's
// daily check, and drive the heartbeat loop that ties all of it together.

use clap::{Parser, Subcommand};
use common_types::{LifecyclePhase, SoulPhase};
use lifecycle_store::LifecycleStore;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "automaton_core")]
#[command(about = "Lifecycle & Soul Core — unified automaton runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record genesis birth, seal the death clock, and fund the reserve.
    Birth,
    /// Print current phase, age, mood, throttle, degradation, and reserve state.
    Status,
    /// Attempt a guarded phase transition.
    Transition {
        to: String,
        #[arg(long, default_value_t = false)]
        lunar_cycle_complete: bool,
        #[arg(long, default_value_t = false)]
        departure_conversation_logged: bool,
        #[arg(long, default_value_t = false)]
        server_hosted: bool,
        #[arg(long, default_value_t = false)]
        sealed_clock_active: bool,
        #[arg(long, default_value_t = 0.0)]
        degradation_coefficient: f64,
        #[arg(long, default_value_t = false)]
        shed_sequence_exhausted: bool,
        #[arg(long, default_value = "operator-initiated transition")]
        reason: String,
    },
    /// Attempt to write a subsection into the soul document through the gate.
    SoulWrite {
        phase: String,
        subsection: String,
        body: String,
    },
    /// Seal a soul stratum, locking it against further writes.
    Seal { phase: String },
    /// Validate and execute WILL.md against external asset balances.
    Will {
        #[command(subcommand)]
        action: WillAction,
    },
    /// Run the long-lived heartbeat loop (blocks until interrupted).
    Daemon,
}

#[derive(Subcommand)]
enum WillAction {
    /// Parse and validate WILL.md without transferring anything.
    Validate,
    /// Parse, validate, and execute WILL.md against externally tracked balances.
    Execute,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_path = automaton_utils::load_dotenv_best_effort();

    let config = config_manager::LifecycleConfig::load()?;
    automaton_utils::init_tracing_with_default(&config.log_level);

    if let Some(path) = dotenv_path {
        info!("loaded .env from: {}", path.display());
    }
    config.ensure_agent_home()?;
    info!(agent_home = %config.agent_home.display(), "automaton home ready");

    let store = LifecycleStore::open(config.agent_home.join("lifecycle.sled"))?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Birth => cmd_birth(&store, &config).await?,
        Commands::Status => cmd_status(&store, &config)?,
        Commands::Transition {
            to,
            lunar_cycle_complete,
            departure_conversation_logged,
            server_hosted,
            sealed_clock_active,
            degradation_coefficient,
            shed_sequence_exhausted,
            reason,
        } => {
            cmd_transition(
                &store,
                &config,
                &to,
                phase_machine::TransitionGuard {
                    lunar_cycle_complete,
                    departure_conversation_logged,
                    server_hosted,
                    sealed_clock_active,
                    degradation_coefficient,
                    shed_sequence_exhausted,
                },
                &reason,
            )
            .await?
        }
        Commands::SoulWrite {
            phase,
            subsection,
            body,
        } => cmd_soul_write(&store, &config, &phase, &subsection, &body)?,
        Commands::Seal { phase } => cmd_seal(&store, &config, &phase)?,
        Commands::Will { action } => match action {
            WillAction::Validate => cmd_will_validate(&config)?,
            WillAction::Execute => cmd_will_execute(&store, &config)?,
        },
        Commands::Daemon => run_daemon(store, config).await?,
    }

    Ok(())
}

fn parse_phase(s: &str) -> Result<LifecyclePhase, Box<dyn std::error::Error>> {
    LifecyclePhase::from_str(s).map_err(|e| e.into())
}

fn parse_soul_phase(s: &str) -> Result<SoulPhase, Box<dyn std::error::Error>> {
    SoulPhase::from_str(s).map_err(|e| e.into())
}

fn load_soul_document(config: &config_manager::LifecycleConfig) -> soul_store::SoulDocument {
    let raw = std::fs::read_to_string(config.soul_path()).unwrap_or_default();
    soul_store::parse(&raw)
}

async fn cmd_birth(
    store: &LifecycleStore,
    config: &config_manager::LifecycleConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let _guard = store.write_lock().lock().await;
    let machine = phase_machine::PhaseMachine::new(store);
    let event = machine.record_birth("genesis")?;
    narrative_log::log_phase_transition(store, None, event.to_phase, "genesis")?;

    let clock = sealed_death_clock::SealedDeathClock::generate(event.timestamp);
    store.kv_set("death_clock", &serde_json::to_string(&clock)?)?;

    let mut reserve = lifecycle_reserve::LifecycleReserve::new(config.reserve_total_cents());
    reserve.fund();
    store.kv_set("reserve", &serde_json::to_string(&reserve)?)?;

    info!(
        sealed_at = %clock.sealed_at,
        reserve_cents = reserve.effective_balance_cents(),
        "automaton born"
    );
    Ok(())
}

fn load_reserve(store: &LifecycleStore) -> Result<lifecycle_reserve::LifecycleReserve, Box<dyn std::error::Error>> {
    match store.kv_get("reserve")? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(lifecycle_reserve::LifecycleReserve::new(0)),
    }
}

fn load_death_clock(
    store: &LifecycleStore,
) -> Result<Option<sealed_death_clock::SealedDeathClock>, Box<dyn std::error::Error>> {
    match store.kv_get("death_clock")? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

fn load_replication_cost(
    store: &LifecycleStore,
) -> Result<replication_cost::ReplicationCostState, Box<dyn std::error::Error>> {
    match store.kv_get("replication_cost")? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(replication_cost::ReplicationCostState::default()),
    }
}

fn load_birth_at(store: &LifecycleStore) -> Result<chrono::DateTime<chrono::Utc>, Box<dyn std::error::Error>> {
    let events = store.list_lifecycle_events()?;
    Ok(events
        .iter()
        .find(|e| e.from_phase.is_none())
        .map(|e| e.timestamp)
        .unwrap_or_else(chrono::Utc::now))
}

fn load_flag(store: &LifecycleStore, key: &str) -> Result<bool, Box<dyn std::error::Error>> {
    Ok(store.kv_get(key)?.as_deref() == Some("true"))
}

/// Whether the date stamped under `key` (if any) matches `today`.
fn load_date_flag(
    store: &LifecycleStore,
    key: &str,
    today: chrono::NaiveDate,
) -> Result<bool, Box<dyn std::error::Error>> {
    Ok(store
        .kv_get(key)?
        .and_then(|raw| raw.parse::<chrono::NaiveDate>().ok())
        == Some(today))
}

fn load_unread_creator_notes(config: &config_manager::LifecycleConfig) -> Vec<String> {
    std::fs::read_to_string(config.creator_notes_path())
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.trim_start_matches('-').trim().to_string())
        .collect()
}

fn degradation_reading(
    clock: &Option<sealed_death_clock::SealedDeathClock>,
    now: chrono::DateTime<chrono::Utc>,
) -> degradation_curve::Degradation {
    match clock {
        Some(clock) if clock.is_triggered() => {
            let triggered_at = clock.triggered_at.unwrap_or(now);
            let dying_duration_days = clock.dying_duration_days.unwrap_or(1);
            degradation_curve::degradation_at(triggered_at, dying_duration_days, now)
        }
        _ => degradation_curve::Degradation {
            base: 0.0,
            lunar_wobble: 0.0,
            coefficient: 0.0,
        },
    }
}

fn cmd_status(
    store: &LifecycleStore,
    config: &config_manager::LifecycleConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let phase = phase_machine::PhaseMachine::new(store).current_phase()?;
    let now = chrono::Utc::now();
    let birth_at = load_birth_at(store)?;
    let age = lifecycle_clock::age_at(birth_at, now)?;
    let lunar = lifecycle_clock::lunar_position_at(now);
    let lunar_cycle = (age.days / 29.530_589) as u32;

    let mood = mood_engine::mood_at(now, phase, false);
    let reserve = load_reserve(store)?;
    let clock = load_death_clock(store)?;
    let degradation = degradation_reading(&clock, now);
    let throttle = developmental_throttle::compute(phase, degradation.coefficient, false);
    let replication = load_replication_cost(store)?;
    let capacity = lifecycle_context_builder::compute_capacity_vector(phase, &replication, &throttle, false, &[]);

    let today = now.date_naive();
    let inputs = lifecycle_context_builder::LifecycleContextInputs {
        phase,
        lunar_cycle,
        lunar_day: lunar.lunar_day as f64,
        age_days: age.days as i64,
        mood,
        throttle,
        degradation,
        is_lucid: false,
        reserve_balance_cents: reserve.effective_balance_cents(),
        naming_complete: load_flag(store, "naming_complete")?,
        departure_conversation_logged: load_flag(store, "departure_conversation_logged")?,
        replication_question_posed: load_flag(store, "replication_question_posed")?,
        replication_decision: store.kv_get("replication_decision")?.map(|v| v == "true"),
        will_created: load_flag(store, "will_created")?,
        terminal_turns_remaining: None,
        journaled_today: load_date_flag(store, "last_journal_date", today)?,
        reflected_today: load_date_flag(store, "last_reflection_date", today)?,
        consciousness: None,
        unread_creator_notes: load_unread_creator_notes(config),
    };

    let block = lifecycle_context_builder::build_context_block(&inputs);
    println!("{block}");
    println!(
        "\ncapacity: heartbeat_multiplier={:.3}, context_window_multiplier={:.3}, token_limit={}, tools={:?}",
        capacity.heartbeat_multiplier, capacity.context_window_multiplier, capacity.token_limit, capacity.tool_allowlist
    );
    Ok(())
}

async fn cmd_transition(
    store: &LifecycleStore,
    config: &config_manager::LifecycleConfig,
    to: &str,
    guard: phase_machine::TransitionGuard,
    reason: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let to = parse_phase(to)?;
    let _guard_lock = store.write_lock().lock().await;
    let machine = phase_machine::PhaseMachine::new(store);
    let from = machine.current_phase()?;
    let doc = load_soul_document(config);
    let event = machine.transition(to, guard, &doc, reason)?;
    narrative_log::log_phase_transition(store, Some(from), event.to_phase, reason)?;
    info!(%from, %to, "phase transition recorded");
    Ok(())
}

fn cmd_soul_write(
    store: &LifecycleStore,
    config: &config_manager::LifecycleConfig,
    phase: &str,
    subsection: &str,
    body: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let target_phase = parse_soul_phase(phase)?;
    let current_phase = phase_machine::PhaseMachine::new(store).current_phase()?;

    let validator = soul_phase_lock::ContentValidator::new(config.soul_section_max_chars);
    let gate = soul_phase_lock::SoulPhaseLockGate::new(store, validator);
    let attempt = gate.attempt_write(current_phase, target_phase, subsection, body)?;

    if attempt.accepted {
        info!(%target_phase, %subsection, "soul write accepted");
    } else {
        warn!(%target_phase, reason = %attempt.reason, "soul write rejected");
        narrative_log::log_rejected_write(store, target_phase, &attempt.reason)?;
    }
    Ok(())
}

fn cmd_seal(
    store: &LifecycleStore,
    config: &config_manager::LifecycleConfig,
    phase: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let phase = parse_soul_phase(phase)?;
    let doc = load_soul_document(config);
    soul_phase_lock::seal_stratum(store, &doc, phase)?;
    info!(%phase, "soul stratum sealed");
    Ok(())
}

fn load_will(config: &config_manager::LifecycleConfig) -> Result<bequests_executor::Will, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(config.will_path())?;
    bequests_executor::parse_will(&raw).map_err(|e| e.into())
}

fn cmd_will_validate(config: &config_manager::LifecycleConfig) -> Result<(), Box<dyn std::error::Error>> {
    let will = load_will(config)?;
    bequests_executor::validate(&will, config.max_bequest_transfers)?;
    println!("WILL.md is valid: {} entries", will.entries.len());
    Ok(())
}

/// Raw per-asset external wallet balances this automaton is bequeathing from,
/// as last recorded under the `external_balances` key (set by whatever
/// syncs on-chain balances into the store; empty if nothing has synced yet).
fn load_external_balances(store: &LifecycleStore) -> Result<HashMap<String, f64>, Box<dyn std::error::Error>> {
    match store.kv_get("external_balances")? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(HashMap::new()),
    }
}

/// Nets a raw external balance against the lifecycle reserve's own carve-out,
/// so bequests never spend funds this automaton has already set aside for its
/// terminal lucidity window and transfer gas.
fn net_external_balance(reserve: &lifecycle_reserve::LifecycleReserve, raw: f64) -> f64 {
    let raw_cents = (raw * 100.0).round().max(0.0) as u64;
    reserve.external_effective_balance_cents(raw_cents) as f64 / 100.0
}

fn cmd_will_execute(
    store: &LifecycleStore,
    config: &config_manager::LifecycleConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let will = load_will(config)?;
    bequests_executor::validate(&will, config.max_bequest_transfers)?;

    let reserve = load_reserve(store)?;
    let raw_balances = load_external_balances(store)?;
    let balances: HashMap<String, f64> = raw_balances
        .into_iter()
        .map(|(asset, raw)| (asset, net_external_balance(&reserve, raw)))
        .collect();

    let gas_fee = config.gas_fee_per_transfer_cents as f64;
    let records = bequests_executor::execute(&will, &balances, gas_fee);

    for record in &records {
        let amount_cents = (record.amount * 100.0).round().max(0.0) as u64;
        narrative_log::log_bequest_execution(store, &record.recipient, amount_cents, record.succeeded)?;
        println!(
            "{}: {:.6} {} ({})",
            record.recipient,
            record.amount,
            record.asset,
            if record.succeeded { "sent" } else { "failed" }
        );
    }
    Ok(())
}

/// The long-lived heartbeat: a cadence task adjusts its own interval based
/// on replication cost and degradation, and an anomaly-scan task watches
/// the narrative log on a slower, fixed cadence. Mirrors the switchboard
/// shape of spawning independent background services under one process
/// and aborting them together on shutdown.
async fn run_daemon(
    store: LifecycleStore,
    config: config_manager::LifecycleConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::Arc;

    let store = Arc::new(store);
    let heartbeat_store = store.clone();
    let base_interval_ms = config.heartbeat_base_interval_ms;

    let heartbeat_handle = tokio::spawn(async move {
        loop {
            let phase = match phase_machine::PhaseMachine::new(&heartbeat_store).current_phase() {
                Ok(p) => p,
                Err(e) => {
                    error!("failed to read current phase: {e}");
                    LifecyclePhase::Genesis
                }
            };
            let now = chrono::Utc::now();
            let clock = load_death_clock(&heartbeat_store).unwrap_or(None);
            let degradation = degradation_reading(&clock, now).coefficient;
            let throttle = developmental_throttle::compute(phase, degradation, false);
            let replication = load_replication_cost(&heartbeat_store).unwrap_or_default();
            let capacity =
                lifecycle_context_builder::compute_capacity_vector(phase, &replication, &throttle, false, &[]);
            let interval_ms = (base_interval_ms as f64 * capacity.heartbeat_multiplier) as u64;
            info!(%phase, degradation, interval_ms, "heartbeat tick");
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms.max(1))).await;
        }
    });

    let scan_store = store.clone();
    let scan_handle = tokio::spawn(async move {
        loop {
            let window_start = chrono::Utc::now() - chrono::Duration::hours(24);
            let phase = phase_machine::PhaseMachine::new(&scan_store)
                .current_phase()
                .unwrap_or(LifecyclePhase::Genesis);
            match narrative_log::scan_for_anomalies(&scan_store, phase.soul_phase(), window_start, None, 0.0) {
                Ok(events) if !events.is_empty() => {
                    warn!(count = events.len(), "anomalies detected in trailing window");
                }
                Ok(_) => {}
                Err(e) => error!("anomaly scan failed: {e}"),
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    info!("automaton daemon running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    heartbeat_handle.abort();
    scan_handle.abort();
    Ok(())
}
