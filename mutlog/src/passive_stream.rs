//! The passive stream (§4.4): applies a peer's inbound mutations to the
//! local checkpoint manager and external store.

use std::sync::Arc;

use mutlog_core::Seqno;
use tracing::{debug, warn};

use crate::error::PassiveStreamError;
use crate::manager::CheckpointManager;
use crate::mutation::Mutation;
use crate::wire::{
    DeletionMessage, ExpirationMessage, MutationMessage, SnapshotFlags, SnapshotMarker, StreamEndReason, VBucketState,
};

pub struct PassiveStream {
    manager: Arc<CheckpointManager>,
    last_seqno: Seqno,
}

impl PassiveStream {
    pub fn new(manager: Arc<CheckpointManager>) -> PassiveStream {
        PassiveStream {
            manager,
            last_seqno: Seqno::from_i64(-1),
        }
    }

    pub fn last_seqno(&self) -> Seqno {
        self.last_seqno
    }

    /// Apply an inbound data mutation. Enforces `by_seqno > last_seqno`;
    /// violations are reported and the message is dropped (§7 propagation:
    /// at-least-once, errors are logged and the message acknowledged).
    pub fn on_mutation(&mut self, mut mutation: Mutation) -> Result<(), PassiveStreamError> {
        if mutation.by_seqno() <= self.last_seqno {
            warn!(
                expected = %self.last_seqno.successor(),
                actual = %mutation.by_seqno(),
                "dropping out-of-range inbound mutation"
            );
            return Err(PassiveStreamError::OutOfRange {
                expected: self.last_seqno.successor(),
                actual: mutation.by_seqno(),
            });
        }
        let seqno = mutation.by_seqno();
        mutation.set_by_seqno(seqno);
        self.manager.queue(mutation, false)?;
        self.last_seqno = seqno;
        Ok(())
    }

    pub fn on_wire_mutation(&mut self, msg: &MutationMessage) -> Result<(), PassiveStreamError> {
        let mut mutation = Mutation::set(msg.key.clone(), msg.value.clone(), msg.rev_seqno, msg.partition);
        mutation.set_by_seqno(msg.by_seqno);
        self.on_mutation(mutation)
    }

    pub fn on_wire_deletion(&mut self, msg: &DeletionMessage) -> Result<(), PassiveStreamError> {
        let mut mutation = Mutation::delete(msg.key.clone(), msg.rev_seqno, msg.partition);
        mutation.set_by_seqno(msg.by_seqno);
        self.on_mutation(mutation)
    }

    pub fn on_wire_expiration(&mut self, msg: &ExpirationMessage) -> Result<(), PassiveStreamError> {
        let mut mutation = Mutation::expire(msg.key.clone(), msg.rev_seqno, msg.partition);
        mutation.set_by_seqno(msg.by_seqno);
        self.on_mutation(mutation)
    }

    /// A marker adjusts the local checkpoint list to match the peer's
    /// authoritative checkpoint boundary (§4.4).
    pub fn on_marker(&mut self, marker: &SnapshotMarker) {
        match marker.flags {
            SnapshotFlags::Disk if self.manager.stats().num_items == 0 => {
                self.manager.check_and_add(0);
            }
            _ => {
                // A new open snapshot with open_id + 1: the common case is
                // just a rotation, keeping the just-closed snapshot as
                // history rather than discarding it via check_and_add.
                self.manager.create_new_checkpoint(true);
            }
        }
    }

    /// The peer is handing off ownership of this partition (takeover): the
    /// local replica adopts active state once the handoff completes. There
    /// is no local checkpoint bookkeeping to adjust here; the caller's
    /// external store/partition-state layer reacts to the state change.
    pub fn on_set_vbucket_state(&mut self, state: VBucketState) {
        debug!(partition = ?self.manager.partition_id(), ?state, "passive stream observed vbucket state change");
    }

    /// The peer has closed its stream; nothing further will arrive on it.
    /// Bookkeeping for reconnect/backfill-from-here lives in `last_seqno`,
    /// already tracked as data flowed through `on_mutation`.
    pub fn on_stream_end(&mut self, reason: StreamEndReason) {
        debug!(partition = ?self.manager.partition_id(), ?reason, "passive stream ended");
    }
}
