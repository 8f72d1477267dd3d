//! A deduplicated, ordered slice of mutation history.
//!
//! Items are stored in an append-only arena: a dedup never moves or removes
//! an existing slot, it tombstones the old slot and appends the new value at
//! the tail. This keeps cursor positions (plain indices into the arena)
//! stable across dedup, per the "arena + stable handle" pattern used
//! throughout this crate instead of a linked list with embedded iterators.

use std::collections::HashMap;
use std::time::Instant;

use mutlog_core::{PartitionId, Seqno};

use crate::mutation::Mutation;

/// A single arena slot. Tombstoned slots are skipped by iteration but keep
/// their index stable so cursors pointing past them remain valid.
struct Slot {
    mutation: Mutation,
    live: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SnapshotState {
    Open,
    Closed,
}

pub struct Snapshot {
    snapshot_id: u64,
    partition_id: PartitionId,
    creation_time: Instant,
    state: SnapshotState,
    items: Vec<Slot>,
    /// key -> arena index of its current live slot.
    index: HashMap<Vec<u8>, usize>,
    cursor_refcount: usize,
    memory_overhead: usize,
}

/// Result of [`Snapshot::insert`].
#[derive(Debug, Clone, Copy)]
pub enum InsertOutcome {
    /// A brand new key (or a meta item). `position` is its arena index.
    Inserted { position: usize },
    /// An existing key's live entry was replaced. `old_position` is now a
    /// tombstone; `new_position` (the tail) holds the new value.
    Deduplicated {
        old_position: usize,
        new_position: usize,
    },
}

impl InsertOutcome {
    pub fn position(&self) -> usize {
        match *self {
            InsertOutcome::Inserted { position } => position,
            InsertOutcome::Deduplicated { new_position, .. } => new_position,
        }
    }

    pub fn is_new_item(&self) -> bool {
        matches!(self, InsertOutcome::Inserted { .. })
    }
}

/// Per-entry memory accounting overhead, in addition to key length.
const ENTRY_OVERHEAD_BYTES: usize = 64;

impl Snapshot {
    pub fn open(snapshot_id: u64, partition_id: PartitionId) -> Snapshot {
        Snapshot {
            snapshot_id,
            partition_id,
            creation_time: Instant::now(),
            state: SnapshotState::Open,
            items: Vec::new(),
            index: HashMap::new(),
            cursor_refcount: 0,
            memory_overhead: 0,
        }
    }

    pub fn snapshot_id(&self) -> u64 {
        self.snapshot_id
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    pub fn creation_time(&self) -> Instant {
        self.creation_time
    }

    pub fn state(&self) -> SnapshotState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SnapshotState::Open
    }

    /// Number of live (non-tombstoned) data entries. Used for the
    /// size-rotation threshold.
    pub fn num_items(&self) -> usize {
        self.index.len()
    }

    pub fn memory_overhead(&self) -> usize {
        self.memory_overhead
    }

    pub fn cursor_refcount(&self) -> usize {
        self.cursor_refcount
    }

    pub fn register_cursor(&mut self) {
        self.cursor_refcount += 1;
    }

    pub fn deregister_cursor(&mut self) {
        debug_assert!(self.cursor_refcount > 0);
        self.cursor_refcount = self.cursor_refcount.saturating_sub(1);
    }

    /// Transition to closed. One-way: closed snapshots never reopen.
    pub fn close(&mut self) {
        self.state = SnapshotState::Closed;
    }

    /// Insert a mutation, deduplicating against any live entry for the same
    /// key. Meta items are never indexed.
    pub fn insert(&mut self, mutation: Mutation) -> InsertOutcome {
        self.memory_overhead += mutation.key().len() + ENTRY_OVERHEAD_BYTES;

        if mutation.is_meta() {
            let position = self.push(mutation);
            return InsertOutcome::Inserted { position };
        }

        if let Some(&old_position) = self.index.get(mutation.key()) {
            self.items[old_position].live = false;
            let key = mutation.key().to_vec();
            let new_position = self.push(mutation);
            self.index.insert(key, new_position);
            InsertOutcome::Deduplicated {
                old_position,
                new_position,
            }
        } else {
            let key = mutation.key().to_vec();
            let position = self.push(mutation);
            self.index.insert(key, position);
            InsertOutcome::Inserted { position }
        }
    }

    fn push(&mut self, mutation: Mutation) -> usize {
        let position = self.items.len();
        self.items.push(Slot {
            mutation,
            live: true,
        });
        position
    }

    /// Lowest seqno among data items, or `None` if the snapshot has no data
    /// items yet (only meta items, or empty).
    pub fn low_seqno(&self) -> Option<Seqno> {
        self.items
            .iter()
            .find(|s| !s.mutation.is_meta())
            .map(|s| s.mutation.by_seqno())
    }

    /// Highest seqno among data items.
    pub fn high_seqno(&self) -> Option<Seqno> {
        self.items
            .iter()
            .rev()
            .find(|s| !s.mutation.is_meta())
            .map(|s| s.mutation.by_seqno())
    }

    /// Lowest seqno of any item (including meta), used to detect the
    /// snapshot's full covered range for cursor registration.
    pub fn low_seqno_any(&self) -> Option<Seqno> {
        self.items.first().map(|s| s.mutation.by_seqno())
    }

    pub fn high_seqno_any(&self) -> Option<Seqno> {
        self.items.last().map(|s| s.mutation.by_seqno())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Mutation> {
        self.items.get(position).map(|s| &s.mutation)
    }

    pub fn is_live(&self, position: usize) -> bool {
        self.items.get(position).map(|s| s.live).unwrap_or(false)
    }

    /// Position of the live slot for `key`, if present.
    pub fn position_of(&self, key: &[u8]) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Arena index of the item whose by_seqno equals `seqno`, or the
    /// largest strictly less, via binary search (the arena is append-only
    /// and therefore sorted by seqno).
    pub fn position_at_or_before(&self, seqno: Seqno) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let mut lo = 0usize;
        let mut hi = self.items.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.items[mid].mutation.by_seqno() <= seqno {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo == 0 {
            None
        } else {
            Some(lo - 1)
        }
    }

    /// First arena index strictly after `position` (or the first index if
    /// `position` is `None`) that holds a live item, skipping tombstones.
    /// Meta items count as live for iteration purposes.
    pub fn next_live_position_after(&self, position: Option<usize>) -> Option<usize> {
        let start = match position {
            None => 0,
            Some(p) => p + 1,
        };
        (start..self.items.len()).find(|&i| self.items[i].live)
    }

    /// Count of live data items (meta items excluded, per §8 property 6)
    /// strictly after `position`.
    pub fn live_count_after(&self, position: Option<usize>) -> usize {
        let start = match position {
            None => 0,
            Some(p) => p + 1,
        };
        self.items
            .get(start..)
            .map(|s| s.iter().filter(|slot| slot.live && !slot.mutation.is_meta()).count())
            .unwrap_or(0)
    }

    /// Is `position` the index of the last *data* item before the
    /// snapshot's trailing `SnapshotEnd` (if closed)?
    pub fn is_last_data_item(&self, position: usize) -> bool {
        match self.items.get(position) {
            Some(slot) if !slot.mutation.is_meta() => {
                !(position + 1..self.items.len())
                    .any(|i| self.items[i].live && !self.items[i].mutation.is_meta())
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mutlog_core::RevSeqno;

    fn set(key: &str, seqno: i64) -> Mutation {
        let mut m = Mutation::set(
            key.as_bytes().to_vec(),
            b"value".to_vec(),
            RevSeqno::from_u64(1),
            PartitionId::from_u16(0),
        );
        m.set_by_seqno(Seqno::from_i64(seqno));
        m
    }

    #[test]
    fn test_insert_new_then_dedup() {
        let mut snap = Snapshot::open(1, PartitionId::from_u16(0));
        let r1 = snap.insert(set("key1", 1));
        assert!(r1.is_new_item());
        assert_eq!(snap.num_items(), 1);

        let r2 = snap.insert(set("key1", 2));
        assert!(!r2.is_new_item());
        assert_eq!(snap.num_items(), 1, "dedup must not grow live count");

        match r2 {
            InsertOutcome::Deduplicated {
                old_position,
                new_position,
            } => {
                assert!(!snap.is_live(old_position));
                assert!(snap.is_live(new_position));
            }
            _ => panic!("expected dedup"),
        }
    }

    #[test]
    fn test_at_most_one_live_entry_per_key() {
        let mut snap = Snapshot::open(1, PartitionId::from_u16(0));
        for seqno in 1..=5 {
            snap.insert(set("key1", seqno));
        }
        assert_eq!(snap.num_items(), 1);
        let pos = snap.position_of(b"key1").unwrap();
        assert_eq!(snap.get(pos).unwrap().by_seqno(), Seqno::from_i64(5));
    }

    #[test]
    fn test_low_high_seqno() {
        let mut snap = Snapshot::open(1, PartitionId::from_u16(0));
        snap.insert(set("key1", 1));
        snap.insert(set("key2", 2));
        snap.insert(set("key3", 3));
        assert_eq!(snap.low_seqno(), Some(Seqno::from_i64(1)));
        assert_eq!(snap.high_seqno(), Some(Seqno::from_i64(3)));
    }

    #[test]
    fn test_position_at_or_before() {
        let mut snap = Snapshot::open(1, PartitionId::from_u16(0));
        snap.insert(set("key1", 1));
        snap.insert(set("key2", 3));
        snap.insert(set("key3", 5));
        assert_eq!(snap.position_at_or_before(Seqno::from_i64(4)), Some(1));
        assert_eq!(snap.position_at_or_before(Seqno::from_i64(5)), Some(2));
        assert_eq!(snap.position_at_or_before(Seqno::from_i64(0)), None);
    }

    #[test]
    fn test_next_live_position_skips_tombstones() {
        let mut snap = Snapshot::open(1, PartitionId::from_u16(0));
        snap.insert(set("key1", 1));
        snap.insert(set("key2", 2));
        snap.insert(set("key1", 3)); // tombstones position 0, appends at 2

        let mut cur = None;
        let mut seen = Vec::new();
        while let Some(p) = snap.next_live_position_after(cur) {
            seen.push(snap.get(p).unwrap().by_seqno().as_i64());
            cur = Some(p);
        }
        assert_eq!(seen, vec![2, 3]);
    }
}
