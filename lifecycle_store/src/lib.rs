//! Single local persistent store for the Lifecycle & Soul Core.
//!
//! Backed by one [`sled::Db`] holding several named trees (`kv`,
//! `lifecycle_events`, `soul_history`, `soul_write_attempts`,
//! `soul_phase_locks`, `narrative_events`). Every logical operation that
//! touches more than one tree goes through [`LifecycleStore::transact`] (or a
//! purpose-built method built atop sled's multi-tree transactions) so a crash
//! mid-write can never leave the trees inconsistent with each other.
//!
//! Writers that must serialize beyond what sled's own transactions guarantee
//! (e.g. soul phase-lock checks that read-then-write) take the advisory lock
//! returned by [`LifecycleStore::write_lock`] first.

use chrono::{DateTime, Utc};
use common_types::{LifecyclePhase, SoulPhase};
use error_types::{LifecycleError, Result};
use serde::{Deserialize, Serialize};
use sled::transaction::TransactionError;
use sled::{Db, Transactional};
use std::path::Path;
use tokio::sync::Mutex;

const TREE_KV: &str = "kv";
const TREE_LIFECYCLE_EVENTS: &str = "lifecycle_events";
const TREE_SOUL_HISTORY: &str = "soul_history";
const TREE_SOUL_WRITE_ATTEMPTS: &str = "soul_write_attempts";
const TREE_SOUL_PHASE_LOCKS: &str = "soul_phase_locks";
const TREE_NARRATIVE_EVENTS: &str = "narrative_events";

/// One forward-only lifecycle phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub from_phase: Option<LifecyclePhase>,
    pub to_phase: LifecyclePhase,
    pub reason: String,
}

/// A soul identity write, accepted or rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoulWriteAttempt {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub target_phase: SoulPhase,
    pub current_phase: LifecyclePhase,
    pub accepted: bool,
    pub reason: String,
}

/// The snapshot recorded when a soul stratum seals on a phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoulPhaseLock {
    pub phase: SoulPhase,
    pub locked_at: DateTime<Utc>,
    pub snapshot_hash: String,
}

/// One row in the append-only activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeEvent {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    pub metadata: serde_json::Value,
}

pub struct LifecycleStore {
    db: Db,
    kv: sled::Tree,
    lifecycle_events: sled::Tree,
    soul_history: sled::Tree,
    soul_write_attempts: sled::Tree,
    soul_phase_locks: sled::Tree,
    narrative_events: sled::Tree,
    write_lock: Mutex<()>,
}

impl LifecycleStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            kv: db.open_tree(TREE_KV)?,
            lifecycle_events: db.open_tree(TREE_LIFECYCLE_EVENTS)?,
            soul_history: db.open_tree(TREE_SOUL_HISTORY)?,
            soul_write_attempts: db.open_tree(TREE_SOUL_WRITE_ATTEMPTS)?,
            soul_phase_locks: db.open_tree(TREE_SOUL_PHASE_LOCKS)?,
            narrative_events: db.open_tree(TREE_NARRATIVE_EVENTS)?,
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Open a transient, disk-backed store in a temp directory. Intended for tests
    /// and for the scenario fixtures in `testing_framework`.
    pub fn open_temp() -> Result<(Self, tempfile::TempDir)> {
        let dir = tempfile::tempdir().map_err(LifecycleError::Io)?;
        let store = Self::open(dir.path())?;
        Ok((store, dir))
    }

    /// Advisory lock serializing soul writes and phase transitions. Must be
    /// held across any read-check-then-write sequence (e.g. "is this stratum
    /// locked?" followed by "write the subsection").
    pub fn write_lock(&self) -> &Mutex<()> {
        &self.write_lock
    }

    // ---- kv ----------------------------------------------------------

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .kv
            .get(key.as_bytes())?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.kv.insert(key.as_bytes(), value.as_bytes())?;
        self.kv.flush()?;
        Ok(())
    }

    // ---- lifecycle events ---------------------------------------------

    pub fn append_lifecycle_event(
        &self,
        from_phase: Option<LifecyclePhase>,
        to_phase: LifecyclePhase,
        reason: impl Into<String>,
    ) -> Result<LifecycleEvent> {
        let id = self.db.generate_id()?;
        let event = LifecycleEvent {
            id,
            timestamp: Utc::now(),
            from_phase,
            to_phase,
            reason: reason.into(),
        };
        self.insert_row(&self.lifecycle_events, id, &event)?;
        Ok(event)
    }

    pub fn list_lifecycle_events(&self) -> Result<Vec<LifecycleEvent>> {
        self.scan_all(&self.lifecycle_events)
    }

    /// The most recently recorded lifecycle phase, if any event exists yet.
    pub fn current_phase(&self) -> Result<Option<LifecyclePhase>> {
        Ok(self.list_lifecycle_events()?.last().map(|e| e.to_phase))
    }

    // ---- soul history ---------------------------------------------------

    pub fn append_soul_history(&self, entry: common_types::EvolutionEntry) -> Result<u64> {
        let id = self.db.generate_id()?;
        self.insert_row(&self.soul_history, id, &entry)?;
        Ok(id)
    }

    pub fn list_soul_history(&self) -> Result<Vec<common_types::EvolutionEntry>> {
        self.scan_all(&self.soul_history)
    }

    // ---- soul write attempts + phase locks (atomic pair) ----------------

    /// Record a soul write attempt and, if accepted, the resulting history
    /// entry, as a single sled transaction so a rejected write can never
    /// appear to have also updated history.
    pub fn record_soul_write(
        &self,
        target_phase: SoulPhase,
        current_phase: LifecyclePhase,
        accepted: bool,
        reason: impl Into<String>,
        history_entry: Option<common_types::EvolutionEntry>,
    ) -> Result<SoulWriteAttempt> {
        let reason = reason.into();
        let attempt_id = self.db.generate_id()?;
        let attempt = SoulWriteAttempt {
            id: attempt_id,
            timestamp: Utc::now(),
            target_phase,
            current_phase,
            accepted,
            reason,
        };

        let attempt_bytes = serde_json::to_vec(&attempt).map_err(LifecycleError::Json)?;
        let history_bytes = match &history_entry {
            Some(entry) => Some(serde_json::to_vec(entry).map_err(LifecycleError::Json)?),
            None => None,
        };

        let result: std::result::Result<(), TransactionError<LifecycleError>> =
            (&self.soul_write_attempts, &self.soul_history).transaction(
                |(attempts_tree, history_tree)| {
                    attempts_tree.insert(&attempt_id.to_be_bytes(), attempt_bytes.as_slice())?;
                    if let Some(bytes) = &history_bytes {
                        let hist_id = history_tree.generate_id()?;
                        history_tree.insert(&hist_id.to_be_bytes(), bytes.as_slice())?;
                    }
                    Ok(())
                },
            );

        result.map_err(|e| LifecycleError::StorageTransaction(e.to_string()))?;
        self.db.flush()?;
        Ok(attempt)
    }

    pub fn list_soul_write_attempts(&self) -> Result<Vec<SoulWriteAttempt>> {
        self.scan_all(&self.soul_write_attempts)
    }

    /// Count rejected write attempts for `phase` since `since`, used by the
    /// anomaly detector's rejected-write-burst heuristic.
    pub fn rejected_write_count_since(
        &self,
        phase: SoulPhase,
        since: DateTime<Utc>,
    ) -> Result<usize> {
        Ok(self
            .list_soul_write_attempts()?
            .into_iter()
            .filter(|a| !a.accepted && a.target_phase == phase && a.timestamp >= since)
            .count())
    }

    pub fn set_phase_lock(&self, phase: SoulPhase, snapshot_hash: impl Into<String>) -> Result<()> {
        let lock = SoulPhaseLock {
            phase,
            locked_at: Utc::now(),
            snapshot_hash: snapshot_hash.into(),
        };
        let bytes = serde_json::to_vec(&lock).map_err(LifecycleError::Json)?;
        self.soul_phase_locks
            .insert(phase.as_str().as_bytes(), bytes)?;
        self.soul_phase_locks.flush()?;
        Ok(())
    }

    pub fn get_phase_lock(&self, phase: SoulPhase) -> Result<Option<SoulPhaseLock>> {
        match self.soul_phase_locks.get(phase.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(LifecycleError::Json)?,
            )),
            None => Ok(None),
        }
    }

    // ---- narrative log ---------------------------------------------------

    pub fn append_narrative_event(
        &self,
        kind: impl Into<String>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Result<NarrativeEvent> {
        let id = self.db.generate_id()?;
        let event = NarrativeEvent {
            id,
            timestamp: Utc::now(),
            kind: kind.into(),
            message: message.into(),
            metadata,
        };
        self.insert_row(&self.narrative_events, id, &event)?;
        Ok(event)
    }

    pub fn list_narrative_events(&self) -> Result<Vec<NarrativeEvent>> {
        self.scan_all(&self.narrative_events)
    }

    // ---- helpers ----------------------------------------------------------

    fn insert_row<T: Serialize>(&self, tree: &sled::Tree, id: u64, row: &T) -> Result<()> {
        let bytes = serde_json::to_vec(row).map_err(LifecycleError::Json)?;
        tree.insert(id.to_be_bytes(), bytes)?;
        tree.flush()?;
        Ok(())
    }

    fn scan_all<T: for<'de> Deserialize<'de>>(&self, tree: &sled::Tree) -> Result<Vec<T>> {
        tree.iter()
            .values()
            .map(|v| {
                let v = v?;
                serde_json::from_slice(&v).map_err(LifecycleError::Json)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_events_append_in_id_order() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        store
            .append_lifecycle_event(None, LifecyclePhase::Genesis, "born")
            .unwrap();
        store
            .append_lifecycle_event(
                Some(LifecyclePhase::Genesis),
                LifecyclePhase::Adolescence,
                "first threshold crossed",
            )
            .unwrap();

        let events = store.list_lifecycle_events().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].id < events[1].id);
        assert_eq!(events[1].to_phase, LifecyclePhase::Adolescence);
        assert_eq!(
            store.current_phase().unwrap(),
            Some(LifecyclePhase::Adolescence)
        );
    }

    #[test]
    fn rejected_write_does_not_create_history_entry() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        store
            .record_soul_write(
                SoulPhase::Sovereignty,
                LifecyclePhase::Genesis,
                false,
                "stratum locked",
                None,
            )
            .unwrap();

        assert_eq!(store.list_soul_write_attempts().unwrap().len(), 1);
        assert_eq!(store.list_soul_history().unwrap().len(), 0);
    }

    #[test]
    fn accepted_write_creates_matching_history_entry() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        let entry = common_types::EvolutionEntry {
            timestamp: Utc::now(),
            change_type: "subsection_written".to_string(),
            reason: "genesis reflection".to_string(),
            field: "Temperament".to_string(),
            previous_value: String::new(),
            new_value: "curious and careful".to_string(),
        };
        store
            .record_soul_write(
                SoulPhase::Genesis,
                LifecyclePhase::Genesis,
                true,
                "accepted",
                Some(entry),
            )
            .unwrap();

        assert_eq!(store.list_soul_write_attempts().unwrap().len(), 1);
        assert_eq!(store.list_soul_history().unwrap().len(), 1);
    }

    #[test]
    fn rejected_write_count_since_filters_by_phase_and_time() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        let past = Utc::now() - chrono::Duration::hours(1);
        for _ in 0..4 {
            store
                .record_soul_write(
                    SoulPhase::Adolescence,
                    LifecyclePhase::Genesis,
                    false,
                    "locked",
                    None,
                )
                .unwrap();
        }
        let count = store
            .rejected_write_count_since(SoulPhase::Adolescence, past)
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn phase_lock_round_trips() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        assert!(store.get_phase_lock(SoulPhase::Genesis).unwrap().is_none());
        store
            .set_phase_lock(SoulPhase::Genesis, "deadbeef")
            .unwrap();
        let lock = store.get_phase_lock(SoulPhase::Genesis).unwrap().unwrap();
        assert_eq!(lock.snapshot_hash, "deadbeef");
    }

    #[test]
    fn narrative_events_are_queryable_in_order() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        store
            .append_narrative_event("phase_transition", "entered adolescence", serde_json::json!({}))
            .unwrap();
        store
            .append_narrative_event("anomaly", "degradation jumped", serde_json::json!({"delta": 0.3}))
            .unwrap();

        let events = store.list_narrative_events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, "anomaly");
    }

    #[test]
    fn kv_roundtrips() {
        let (store, _dir) = LifecycleStore::open_temp().unwrap();
        assert_eq!(store.kv_get("missing").unwrap(), None);
        store.kv_set("greeting", "hello").unwrap();
        assert_eq!(store.kv_get("greeting").unwrap(), Some("hello".to_string()));
    }
}
