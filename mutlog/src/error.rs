//! Error kinds for the checkpoint manager and stream engine (§7).
//!
//! `StateInvalid` intentionally has no corresponding `Result` variant: an
//! illegal state-machine transition is a programming error, not a
//! recoverable condition, and is reported via [`fatal_invalid_transition`]
//! which panics instead of returning.

use mutlog_core::Seqno;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// `by_seqno` violates monotonicity; the caller should drop the
    /// message.
    #[error("mutation seqno {actual} is out of range (expected > {expected})")]
    OutOfRange { expected: Seqno, actual: Seqno },

    /// Cursor registration below the earliest retained seqno; the caller
    /// must trigger a backfill.
    #[error("seqno {requested} is not covered by any retained snapshot")]
    UncoveredSeqno { requested: Seqno },

    /// Cursor name already exists.
    #[error("cursor {name:?} is already registered")]
    DuplicateCursor { name: String },

    /// Cursor name does not exist.
    #[error("cursor {name:?} is not registered")]
    UnknownCursor { name: String },

    /// A `CheckpointConfig` field was out of its documented bounds.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The manager has begun teardown and refuses new operations.
    #[error("checkpoint manager is shutting down")]
    ShuttingDown,

    /// The backing store's persisted seqno has not yet advanced to a
    /// backfill's required end; the caller should reschedule (§5 Timeouts).
    #[error("backfill stalled: persisted seqno {persisted} has not reached required {required}")]
    BackfillStalled { persisted: Seqno, required: Seqno },
}

/// `StateInvalid` (§7): illegal stream state transitions are fatal
/// programming errors and abort the process rather than propagate.
#[track_caller]
pub fn fatal_invalid_transition(from: &str, attempted: &str) -> ! {
    panic!("illegal stream state transition: {from} -> {attempted}");
}

#[derive(Debug, thiserror::Error)]
pub enum PassiveStreamError {
    #[error("mutation seqno {actual} is out of range (expected > {expected})")]
    OutOfRange { expected: Seqno, actual: Seqno },

    #[error("checkpoint manager error")]
    Manager(#[from] ManagerError),

    #[error("external store rejected the mutation")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
