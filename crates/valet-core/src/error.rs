use thiserror::Error;

use crate::types::Phase;

/// Unified error type for the entire Valet runtime.
#[derive(Error, Debug)]
pub enum ValetError {
    // ── Link (remote store) errors ─────────────────────────────
    #[error("link error: {resource}: {reason}")]
    Link { resource: String, reason: String },

    #[error("link returned HTTP {status} for {resource}")]
    LinkStatus { resource: String, status: u16 },

    #[error("sync failed: {0}")]
    Sync(String),

    // ── Dispatch errors ────────────────────────────────────────
    #[error("behavior fault in {phase} phase: {behavior}: {reason}")]
    Fault {
        phase: Phase,
        behavior: String,
        reason: String,
    },

    // ── Hot-load errors ────────────────────────────────────────
    #[error("unit load failed: {unit}: {reason}")]
    Load { unit: String, reason: String },

    // ── Control command errors ─────────────────────────────────
    #[error("bad control command: {0}")]
    Command(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ValetError {
    /// Shorthand for a unit fault with phase context.
    pub fn fault(phase: Phase, behavior: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fault {
            phase,
            behavior: behavior.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ValetError>;
