//! Unified error types for the Lifecycle & Soul Core.
//!
//! One [`LifecycleError`] variant per error kind named in the design's error
//! handling section, each carrying whatever payload that kind needs. Operational
//! errors (I/O, validation) are meant to be recovered locally and surfaced as
//! typed `Result`s; the [`LifecycleError::Invariant`] variant is reserved for
//! programmer errors — its constructor is crate-private by convention so only
//! the component that detects a broken invariant can raise one.

use common_types::{LifecyclePhase, SoulPhase};
use thiserror::Error;

/// A rejected soul write: the stratum a caller targeted is not the active one.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("soul stratum {target_phase} is locked (current phase is {current_phase}): {reason}")]
pub struct PhaseLockRejection {
    pub target_phase: SoulPhase,
    pub current_phase: LifecyclePhase,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("phase lock rejected: {0}")]
    PhaseLockRejected(#[from] PhaseLockRejection),

    #[error("soul content validation failed: {0}")]
    SoulValidationFailed(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("sealed death clock corrupted: revealed duration did not match any candidate hash")]
    DeathClockCorrupted,

    #[error("bequest entry failed validation: {0}")]
    BequestValidationFailed(String),

    #[error("bequest transfer failed: {0}")]
    BequestTransferFailed(String),

    #[error("clock skew detected: now preceded birth timestamp")]
    ClockSkew,

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("storage transaction error: {0}")]
    StorageTransaction(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl LifecycleError {
    /// Raise a programmer-error invariant violation. Kept as a function (rather
    /// than a bare tuple-struct constructor) so call sites read as a deliberate
    /// escalation, not an ordinary `Result::Err`.
    pub fn invariant(message: impl Into<String>) -> Self {
        LifecycleError::Invariant(message.into())
    }
}

impl From<String> for LifecycleError {
    fn from(s: String) -> Self {
        LifecycleError::Other(s)
    }
}

impl From<&str> for LifecycleError {
    fn from(s: &str) -> Self {
        LifecycleError::Other(s.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
