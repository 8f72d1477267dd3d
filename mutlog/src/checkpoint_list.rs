//! The ordered list of snapshots for one partition, and the counters that
//! hand out by-seqnos and snapshot ids.

use std::collections::VecDeque;

use mutlog_core::{PartitionId, Seqno};

use crate::mutation::{Mutation, Operation};
use crate::snapshot::Snapshot;

/// Ordered list of snapshots for a single partition. Always has at least
/// one snapshot, and the last one is always open.
pub struct CheckpointList {
    partition_id: PartitionId,
    snapshots: VecDeque<Snapshot>,
    last_by_seqno: Seqno,
    last_closed_by_seqno: Seqno,
    next_checkpoint_id: u64,
}

impl CheckpointList {
    pub fn new(partition_id: PartitionId) -> CheckpointList {
        let mut snapshots = VecDeque::new();
        snapshots.push_back(Snapshot::open(0, partition_id));
        let mut list = CheckpointList {
            partition_id,
            snapshots,
            last_by_seqno: Seqno::ZERO,
            last_closed_by_seqno: Seqno::ZERO,
            next_checkpoint_id: 1,
        };
        list.append_meta(Operation::Dummy);
        list.append_meta(Operation::SnapshotStart);
        list
    }

    /// Append a `Dummy`, `SnapshotStart` or `SnapshotEnd` item to the open
    /// snapshot, consuming a seqno like any other mutation (§4.2 rotation
    /// protocol).
    fn append_meta(&mut self, op: Operation) {
        let seqno = self.assign_next_seqno();
        let mut mutation = Mutation::meta(op, self.partition_id);
        mutation.set_by_seqno(seqno);
        self.open_mut().insert(mutation);
    }

    /// Append a meta item at the *current* seqno boundary without advancing
    /// it. Used when bracketing a snapshot whose data seqnos are dictated
    /// by an external peer (a passive stream's `check_and_add`): inventing
    /// a fresh local seqno here would desynchronize `last_by_seqno` from
    /// the peer's numbering and reject the very next replicated mutation.
    fn append_meta_at_boundary(&mut self, op: Operation) {
        let seqno = self.last_by_seqno;
        let mut mutation = Mutation::meta(op, self.partition_id);
        mutation.set_by_seqno(seqno);
        self.open_mut().insert(mutation);
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    pub fn last_by_seqno(&self) -> Seqno {
        self.last_by_seqno
    }

    pub fn last_closed_by_seqno(&self) -> Seqno {
        self.last_closed_by_seqno
    }

    /// Assign the next seqno, advancing `last_by_seqno`.
    pub fn assign_next_seqno(&mut self) -> Seqno {
        self.last_by_seqno = self.last_by_seqno.successor();
        self.last_by_seqno
    }

    /// Record an externally-assigned seqno (a passive stream replaying a
    /// peer's mutation, which already carries its by_seqno).
    pub fn observe_seqno(&mut self, seqno: Seqno) {
        if seqno > self.last_by_seqno {
            self.last_by_seqno = seqno;
        }
    }

    pub fn open_checkpoint_id(&self) -> u64 {
        self.open().snapshot_id()
    }

    pub fn open(&self) -> &Snapshot {
        self.snapshots.back().expect("checkpoint list is never empty")
    }

    pub fn open_mut(&mut self) -> &mut Snapshot {
        self.snapshots.back_mut().expect("checkpoint list is never empty")
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Snapshot> {
        self.snapshots.iter_mut()
    }

    pub fn front(&self) -> &Snapshot {
        self.snapshots.front().expect("checkpoint list is never empty")
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Snapshot> {
        self.snapshots.get_mut(index)
    }

    pub fn index_of_id(&self, snapshot_id: u64) -> Option<usize> {
        self.snapshots.iter().position(|s| s.snapshot_id() == snapshot_id)
    }

    /// Index of the snapshot whose [low, high] (including meta bounds)
    /// covers `seqno`, if any.
    pub fn index_covering(&self, seqno: Seqno) -> Option<usize> {
        self.snapshots.iter().position(|s| {
            matches!((s.low_seqno_any(), s.high_seqno_any()), (Some(low), Some(high)) if seqno >= low && seqno <= high)
        })
    }

    /// Close the current open snapshot, appending its `SnapshotEnd`, and
    /// push a fresh open one bracketed by `Dummy` + `SnapshotStart` (§4.2
    /// rotation protocol).
    pub fn rotate(&mut self) -> u64 {
        let closed_high = self.open().high_seqno();
        self.append_meta(Operation::SnapshotEnd);
        self.open_mut().close();
        if let Some(high) = closed_high {
            self.last_closed_by_seqno = high;
        }
        let new_id = self.next_checkpoint_id;
        self.next_checkpoint_id += 1;
        self.snapshots.push_back(Snapshot::open(new_id, self.partition_id));
        self.append_meta(Operation::Dummy);
        self.append_meta(Operation::SnapshotStart);
        new_id
    }

    /// Force the open snapshot to become the sole snapshot after a
    /// specific id: used by `check_and_add` when later snapshots must be
    /// discarded (replaced by an externally supplied checkpoint id). The
    /// bracketing meta items sit at the current seqno boundary rather than
    /// consuming new ones, since the data that will fill this snapshot is
    /// numbered by a peer, not generated locally.
    pub fn reset_to_single_open(&mut self, snapshot_id: u64) {
        self.snapshots.clear();
        self.snapshots.push_back(Snapshot::open(snapshot_id, self.partition_id));
        self.next_checkpoint_id = snapshot_id + 1;
        self.append_meta_at_boundary(Operation::Dummy);
        self.append_meta_at_boundary(Operation::SnapshotStart);
    }

    /// Remove and return the closed snapshots from the front that satisfy
    /// `predicate`, stopping at the first one that doesn't (or at the open
    /// snapshot).
    pub fn drain_reclaimable_front<F>(&mut self, mut predicate: F) -> Vec<Snapshot>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let mut removed = Vec::new();
        while self.snapshots.len() > 1 {
            let front = self.snapshots.front().expect("non-empty");
            if front.is_open() || !predicate(front) {
                break;
            }
            removed.push(self.snapshots.pop_front().expect("checked non-empty"));
        }
        removed
    }

    /// Remove and return closed, unreferenced snapshots from the front,
    /// same as [`Self::drain_reclaimable_front`], but stopping once the
    /// list has shrunk to `target` snapshots even if more are reclaimable
    /// (`max_checkpoints`'s "target number of snapshots to retain").
    pub fn drain_reclaimable_front_to<F>(&mut self, target: usize, mut predicate: F) -> Vec<Snapshot>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let target = target.max(1);
        let mut removed = Vec::new();
        while self.snapshots.len() > target {
            let front = self.snapshots.front().expect("non-empty");
            if front.is_open() || !predicate(front) {
                break;
            }
            removed.push(self.snapshots.pop_front().expect("checked non-empty"));
        }
        removed
    }

    /// Replace every closed snapshot with a single merged one, keeping the
    /// open snapshot untouched. Returns the removed closed snapshots in
    /// original order, for the caller to fold into the merged snapshot.
    pub fn take_closed_for_collapse(&mut self) -> Vec<Snapshot> {
        let mut closed = Vec::new();
        while self.snapshots.len() > 1 {
            closed.push(self.snapshots.pop_front().expect("checked len > 1"));
        }
        closed
    }

    pub fn push_front(&mut self, snapshot: Snapshot) {
        self.snapshots.push_front(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_list_has_one_open_snapshot() {
        let list = CheckpointList::new(PartitionId::from_u16(0));
        assert_eq!(list.len(), 1);
        assert!(list.open().is_open());
    }

    #[test]
    fn test_seqno_assignment_is_monotone() {
        let mut list = CheckpointList::new(PartitionId::from_u16(0));
        let a = list.assign_next_seqno();
        let b = list.assign_next_seqno();
        let c = list.assign_next_seqno();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_rotate_keeps_exactly_one_open() {
        let mut list = CheckpointList::new(PartitionId::from_u16(0));
        list.rotate();
        assert_eq!(list.len(), 2);
        let open_count = list.iter().filter(|s| s.is_open()).count();
        assert_eq!(open_count, 1);
    }
}
