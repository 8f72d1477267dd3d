//! Foundational value types shared between the checkpoint manager and the
//! stream engine: sequence numbers, revision counters, and partition ids.

pub mod partition;
pub mod seqno;

pub use partition::{PartitionId, PartitionUuid};
pub use seqno::{RevSeqno, Seqno, UNCOVERED_SEQNO};
