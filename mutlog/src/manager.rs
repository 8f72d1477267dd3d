//! The checkpoint manager: one per partition, owns the checkpoint list and
//! every cursor registered against it (§4.2).

use std::collections::HashMap;

use arc_swap::ArcSwap;
use mutlog_core::{PartitionId, Seqno, UNCOVERED_SEQNO};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::checkpoint_list::CheckpointList;
use crate::config::CheckpointConfig;
use crate::cursor::{Cursor, PERSISTENCE_CURSOR};
use crate::error::ManagerError;
use crate::mutation::{Mutation, Operation};
use crate::snapshot::{InsertOutcome, Snapshot};

/// Result of [`CheckpointManager::register_cursor`] /
/// `register_cursor_by_seqno`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorRegistration {
    pub resolved_seqno: Seqno,
    pub started_at_snapshot_boundary: bool,
    /// Highest seqno (including meta brackets) currently buffered in the
    /// snapshot the cursor was parked in, so a caller resuming mid-snapshot
    /// knows the extent of the in-memory range it is about to read without
    /// having walked past that snapshot's own `SnapshotStart` marker.
    pub covering_high_seqno: Seqno,
}

/// Result of [`CheckpointManager::next_item`].
#[derive(Debug, Clone)]
pub struct NextItem {
    pub mutation: Mutation,
    pub is_last_of_snapshot: bool,
    pub snap_end_seqno: Option<Seqno>,
}

/// Result of [`CheckpointManager::remove_closed_unreferenced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimOutcome {
    pub items_purged: usize,
    pub new_open_created: bool,
}

/// Read-only counters exposed for the (out-of-scope) statistics plumbing.
#[derive(Debug, Clone)]
pub struct CheckpointManagerStats {
    pub num_checkpoints: usize,
    pub num_items: usize,
    pub memory_overhead: usize,
    pub persist_again_count: usize,
    pub cursor_pending_counts: HashMap<String, usize>,
}

struct ManagerState {
    list: CheckpointList,
    cursors: HashMap<String, Cursor>,
    num_items: usize,
    persist_again_count: usize,
    shutting_down: bool,
}

/// Owns one partition's checkpoint list and cursor table behind a single
/// mutex, per the manager-mutex locking model in §5.
pub struct CheckpointManager {
    partition_id: PartitionId,
    config: ArcSwap<CheckpointConfig>,
    state: Mutex<ManagerState>,
}

impl CheckpointManager {
    pub fn new(partition_id: PartitionId, config: CheckpointConfig) -> CheckpointManager {
        let mut cursors = HashMap::new();
        cursors.insert(
            PERSISTENCE_CURSOR.to_string(),
            Cursor::new(PERSISTENCE_CURSOR, 0, None, true),
        );
        let mut list = CheckpointList::new(partition_id);
        list.open_mut().register_cursor();
        CheckpointManager {
            partition_id,
            config: ArcSwap::from_pointee(config),
            state: Mutex::new(ManagerState {
                list,
                cursors,
                num_items: 0,
                persist_again_count: 0,
                shutting_down: false,
            }),
        }
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    pub fn config(&self) -> CheckpointConfig {
        **self.config.load()
    }

    /// Hot-swap the manager's configuration (§10.3).
    pub fn set_config(&self, config: CheckpointConfig) {
        self.config.store(std::sync::Arc::new(config));
    }

    pub fn stats(&self) -> CheckpointManagerStats {
        let state = self.state.lock();
        CheckpointManagerStats {
            num_checkpoints: state.list.len(),
            num_items: state.num_items,
            memory_overhead: state.list.iter().map(|s| s.memory_overhead()).sum(),
            persist_again_count: state.persist_again_count,
            cursor_pending_counts: state
                .cursors
                .iter()
                .map(|(name, c)| (name.clone(), c.pending_count()))
                .collect(),
        }
    }

    /// Current `pending_count` for `name` (§10.5 introspection supplement).
    pub fn cursor_seqno(&self, name: &str) -> Option<Seqno> {
        let state = self.state.lock();
        let cursor = state.cursors.get(name)?;
        let index = state.list.index_of_id(cursor.snapshot_id())?;
        let snap = state.list.get(index)?;
        match cursor.position() {
            Some(p) => snap.get(p).map(|m| m.by_seqno()),
            None => None,
        }
    }

    /// Enqueue `mutation`. If `gen_seqno`, the manager assigns `by_seqno`;
    /// otherwise the mutation's own seqno is observed (a passive stream
    /// replaying a peer's already-numbered mutation). Returns true iff the
    /// effective queue size grew (a brand new key or meta item).
    pub fn queue(&self, mut mutation: Mutation, gen_seqno: bool) -> Result<bool, ManagerError> {
        let mut state = self.state.lock();
        if state.shutting_down {
            return Err(ManagerError::ShuttingDown);
        }

        if gen_seqno {
            let seqno = state.list.assign_next_seqno();
            mutation.set_by_seqno(seqno);
        } else {
            let seqno = mutation.by_seqno();
            if seqno <= state.list.last_by_seqno() {
                return Err(ManagerError::OutOfRange {
                    expected: state.list.last_by_seqno().successor(),
                    actual: seqno,
                });
            }
            state.list.observe_seqno(seqno);
        }

        let open_id = state.list.open_checkpoint_id();
        let outcome = state.list.open_mut().insert(mutation);

        if outcome.is_new_item() {
            state.num_items += 1;
        }

        if let InsertOutcome::Deduplicated { old_position, .. } = outcome {
            if let Some(persistence) = state.cursors.get(PERSISTENCE_CURSOR) {
                let persistence_past_it = persistence.snapshot_id() == open_id
                    && persistence.position().map(|p| p > old_position).unwrap_or(false);
                if persistence_past_it {
                    state.persist_again_count += 1;
                    debug!(partition = ?self.partition_id, old_position, "PERSIST_AGAIN");
                }
            }
        }

        self.maybe_rotate(&mut state);
        self.recompute_all_pending_counts(&mut state);

        Ok(outcome.is_new_item())
    }

    fn maybe_rotate(&self, state: &mut ManagerState) {
        let config = self.config();
        let open = state.list.open();
        let by_count = config.item_count_rotation() && open.num_items() >= config.checkpoint_max_items();
        let by_time = open.creation_time().elapsed() >= config.checkpoint_period();
        if by_count || by_time {
            self.rotate_locked(state);
            self.reclaim_to_target(state, &config);
        }
    }

    /// Keep the checkpoint list from growing past `max_checkpoints` by
    /// reclaiming closed, unreferenced snapshots from the front. Honors
    /// `keep_closed_checkpoints` like [`Self::remove_closed_unreferenced`];
    /// a snapshot still referenced by a cursor is left in place even past
    /// the target, since cursors (notably the persistence cursor) must
    /// never be starved of data they have not yet read.
    fn reclaim_to_target(&self, state: &mut ManagerState, config: &CheckpointConfig) {
        if config.keep_closed_checkpoints() {
            return;
        }
        let removed = state
            .list
            .drain_reclaimable_front_to(config.max_checkpoints(), |s| s.cursor_refcount() == 0);
        let items_purged: usize = removed.iter().map(|s| s.len()).sum();
        if items_purged > 0 {
            debug!(partition = ?self.partition_id, items_purged, "reclaimed checkpoints to stay within max_checkpoints");
        }
    }

    fn rotate_locked(&self, state: &mut ManagerState) -> u64 {
        let new_id = state.list.rotate();
        debug!(partition = ?self.partition_id, new_id, "rotated checkpoint");
        new_id
    }

    pub fn register_cursor(
        &self,
        name: impl Into<String>,
        start_seqno: Seqno,
        from_beginning_on_collapse: bool,
    ) -> Result<CursorRegistration, ManagerError> {
        let name = name.into();
        let mut state = self.state.lock();
        if state.cursors.contains_key(&name) {
            return Err(ManagerError::DuplicateCursor { name });
        }

        let earliest = state.list.front().low_seqno_any().unwrap_or(Seqno::ZERO);
        let (effective_seqno, started_at_boundary) = if start_seqno < earliest {
            (earliest, true)
        } else {
            (start_seqno, false)
        };

        let index = match state.list.index_covering(effective_seqno) {
            Some(i) => i,
            None => state.list.len() - 1,
        };
        // At the retention boundary the cursor must still see the earliest
        // retained item itself, so it is parked just *before* the snapshot
        // rather than at `position_at_or_before(effective_seqno)`.
        let seqno_for_position = if started_at_boundary { None } else { Some(effective_seqno) };
        let covering_high_seqno = state.list.get(index).expect("valid index").high_seqno_any().unwrap_or(Seqno::ZERO);
        self.place_cursor(&mut state, name, index, seqno_for_position, from_beginning_on_collapse);

        Ok(CursorRegistration {
            resolved_seqno: effective_seqno,
            started_at_snapshot_boundary: started_at_boundary,
            covering_high_seqno,
        })
    }

    pub fn register_cursor_by_seqno(
        &self,
        name: impl Into<String>,
        start_seqno: Seqno,
    ) -> Result<CursorRegistration, ManagerError> {
        let name = name.into();
        let mut state = self.state.lock();
        if state.cursors.contains_key(&name) {
            return Err(ManagerError::DuplicateCursor { name });
        }
        if start_seqno > state.list.last_by_seqno() {
            return Err(ManagerError::UncoveredSeqno {
                requested: start_seqno,
            });
        }

        // A request below the earliest retained item (including the common
        // case of starting from the very beginning) is covered by the front
        // snapshot; position just before its first item rather than erroring.
        let earliest = state.list.front().low_seqno_any().unwrap_or(Seqno::ZERO);
        let below_earliest = start_seqno < earliest;
        let index = if below_earliest {
            0
        } else {
            state.list.index_covering(start_seqno).ok_or(ManagerError::UncoveredSeqno {
                requested: start_seqno,
            })?
        };
        // The boundary of what the checkpoint manager still retains in memory: a
        // backfill only needs to cover seqnos strictly below this (see active
        // stream backfill sequencing), everything at or after it is servable by
        // the cursor itself.
        let cur_chk_seqno = earliest;
        let seqno_for_position = if below_earliest { None } else { Some(start_seqno) };
        let covering_high_seqno = state.list.get(index).expect("valid index").high_seqno_any().unwrap_or(Seqno::ZERO);
        self.place_cursor(&mut state, name, index, seqno_for_position, false);
        Ok(CursorRegistration {
            resolved_seqno: cur_chk_seqno,
            started_at_snapshot_boundary: below_earliest,
            covering_high_seqno,
        })
    }

    /// `seqno = None` parks the cursor just before the snapshot's first
    /// item (used when registration clamped to the retention boundary);
    /// `Some(seqno)` parks it at the item whose by_seqno is the largest ≤
    /// `seqno`, i.e. "resume strictly after this point".
    fn place_cursor(
        &self,
        state: &mut ManagerState,
        name: String,
        index: usize,
        seqno: Option<Seqno>,
        from_beginning_on_collapse: bool,
    ) {
        let is_open_and_sole_reader = {
            let snap = state.list.get(index).expect("valid index");
            snap.is_open() && snap.cursor_refcount() == 0
        };
        if is_open_and_sole_reader {
            // the snapshot we were about to read becomes closed, at the
            // same index (rotate only appends a new open snapshot).
            self.rotate_locked(state);
        }

        let snap = state.list.get_mut(index).expect("valid index");
        let position = seqno.and_then(|s| snap.position_at_or_before(s));
        snap.register_cursor();
        let snapshot_id = snap.snapshot_id();

        let mut cursor = Cursor::new(name.clone(), snapshot_id, position, from_beginning_on_collapse);
        let pending = self.live_count_from(state, snapshot_id, position);
        cursor.set_pending_count(pending);
        state.cursors.insert(name, cursor);
    }

    pub fn remove_cursor(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let Some(cursor) = state.cursors.remove(name) else {
            return false;
        };
        if let Some(index) = state.list.index_of_id(cursor.snapshot_id()) {
            if let Some(snap) = state.list.get_mut(index) {
                snap.deregister_cursor();
            }
        }
        true
    }

    /// Advance `name` by one position, returning the next item (if any).
    pub fn next_item(&self, name: &str) -> Result<Option<NextItem>, ManagerError> {
        let mut state = self.state.lock();
        loop {
            let Some(cursor) = state.cursors.get(name) else {
                return Err(ManagerError::UnknownCursor { name: name.to_string() });
            };
            let index = state
                .list
                .index_of_id(cursor.snapshot_id())
                .expect("cursor always references a live snapshot");
            let position = cursor.position();

            let snap = state.list.get(index).expect("valid index");
            if let Some(next_pos) = snap.next_live_position_after(position) {
                let mutation = snap.get(next_pos).expect("position is live").clone();
                let is_last_of_snapshot = snap.is_last_data_item(next_pos);
                let snap_end_seqno = snap.high_seqno_any();
                let snapshot_id = snap.snapshot_id();

                let cursor = state.cursors.get_mut(name).expect("checked above");
                cursor.advance_within_snapshot(next_pos);
                let pending = self.live_count_from(&state, snapshot_id, Some(next_pos));
                state.cursors.get_mut(name).expect("checked above").set_pending_count(pending);

                return Ok(Some(NextItem {
                    mutation,
                    is_last_of_snapshot,
                    snap_end_seqno,
                }));
            }

            if snap.is_open() {
                return Ok(None);
            }

            // snapshot exhausted and closed: hop to the next one.
            if index + 1 >= state.list.len() {
                return Ok(None);
            }
            state.list.get_mut(index).expect("valid index").deregister_cursor();
            let next_snapshot_id = state.list.get(index + 1).expect("checked bound").snapshot_id();
            state.list.get_mut(index + 1).expect("checked bound").register_cursor();
            state
                .cursors
                .get_mut(name)
                .expect("checked above")
                .move_to(next_snapshot_id, None);
        }
    }

    /// All live data mutations (meta items filtered per §10.5) from `name`'s
    /// current position up to the live tail. Does not mutate the cursor.
    pub fn all_items_for(&self, name: &str) -> Result<Vec<Mutation>, ManagerError> {
        let state = self.state.lock();
        let cursor = state.cursors.get(name).ok_or_else(|| ManagerError::UnknownCursor {
            name: name.to_string(),
        })?;
        let mut index = state
            .list
            .index_of_id(cursor.snapshot_id())
            .expect("cursor always references a live snapshot");
        let mut position = cursor.position();
        let mut out = Vec::new();

        loop {
            let snap = state.list.get(index).expect("valid index");
            while let Some(next_pos) = snap.next_live_position_after(position) {
                let mutation = snap.get(next_pos).expect("position is live");
                if !mutation.is_meta() {
                    out.push(mutation.clone());
                }
                position = Some(next_pos);
            }
            if index + 1 >= state.list.len() {
                break;
            }
            index += 1;
            position = None;
        }
        Ok(out)
    }

    /// Sum of live items strictly after `position` in `snapshot_id`, plus
    /// every live item in every later snapshot. Recomputed from scratch
    /// under the manager lock rather than patched incrementally, so it is
    /// correct-by-construction after dedup shifts the tail (see
    /// `pending_count` discussion).
    fn live_count_from(&self, state: &ManagerState, snapshot_id: u64, position: Option<usize>) -> usize {
        let index = match state.list.index_of_id(snapshot_id) {
            Some(i) => i,
            None => return 0,
        };
        let mut total = state.list.get(index).map(|s| s.live_count_after(position)).unwrap_or(0);
        for later in index + 1..state.list.len() {
            total += state.list.get(later).map(|s| s.num_items()).unwrap_or(0);
        }
        total
    }

    fn recompute_all_pending_counts(&self, state: &mut ManagerState) {
        let updates: Vec<(String, usize)> = state
            .cursors
            .iter()
            .map(|(name, cursor)| {
                let count = self.live_count_from(state, cursor.snapshot_id(), cursor.position());
                (name.clone(), count)
            })
            .collect();
        for (name, count) in updates {
            state.cursors.get_mut(&name).expect("exists").set_pending_count(count);
        }
    }

    /// Force a checkpoint rotation. Returns the id of the snapshot that was
    /// closed, or 0 if nothing was rotated (the open snapshot was empty and
    /// `force` was false).
    pub fn create_new_checkpoint(&self, force: bool) -> u64 {
        let mut state = self.state.lock();
        if !force && state.list.open().num_items() == 0 {
            return 0;
        }
        let previous_open_id = state.list.open_checkpoint_id();
        self.rotate_locked(&mut state);
        previous_open_id
    }

    /// Ensure the open snapshot carries `id`, discarding whatever the local
    /// list held otherwise (used by the passive side when a peer's marker
    /// names an authoritative checkpoint id).
    pub fn check_and_add(&self, id: u64) {
        let mut state = self.state.lock();
        if state.list.open_checkpoint_id() == id {
            return;
        }
        state.list.reset_to_single_open(id);
        let names: Vec<String> = state.cursors.keys().cloned().collect();
        for name in names {
            state.cursors.get_mut(&name).expect("exists").move_to(id, None);
            state.list.open_mut().register_cursor();
        }
        warn!(partition = ?self.partition_id, id, "checkpoint list reset to authoritative id");
    }

    /// Merge every closed snapshot into one, keyed `id`. Cursors inside any
    /// merged snapshot are reseated per their `from_beginning_on_collapse`
    /// policy (§4.2).
    pub fn collapse_checkpoints(&self, id: u64) {
        if !self.config().enable_checkpoint_merge() {
            return;
        }
        let mut state = self.state.lock();
        let closed = state.list.take_closed_for_collapse();
        if closed.is_empty() {
            return;
        }
        let merged_ids: std::collections::HashSet<u64> = closed.iter().map(|s| s.snapshot_id()).collect();

        let mut merged = Snapshot::open(id, self.partition_id);
        merged.insert(meta_item(&mut state.list, self.partition_id, Operation::Dummy));
        merged.insert(meta_item(&mut state.list, self.partition_id, Operation::SnapshotStart));
        for snap in &closed {
            for position in 0..snap.len() {
                if !snap.is_live(position) {
                    continue;
                }
                let mutation = snap.get(position).expect("live position").clone();
                if mutation.is_meta() {
                    continue;
                }
                merged.insert(mutation);
            }
        }

        let merged_first_data = merged.position_at_or_before(merged.low_seqno().unwrap_or(Seqno::ZERO));
        let merged_tail = merged.len().checked_sub(1);

        merged.insert(meta_item(&mut state.list, self.partition_id, Operation::SnapshotEnd));
        merged.close();

        let names: Vec<String> = state.cursors.keys().cloned().collect();
        let mut refcount = 0usize;
        for name in names {
            let cursor = state.cursors.get(&name).expect("exists");
            if !merged_ids.contains(&cursor.snapshot_id()) {
                continue;
            }
            let new_position = if cursor.from_beginning_on_collapse() {
                merged_first_data
            } else {
                merged_tail
            };
            state.cursors.get_mut(&name).expect("exists").move_to(id, new_position);
            refcount += 1;
        }
        for _ in 0..refcount {
            merged.register_cursor();
        }

        state.list.push_front(merged);
        self.recompute_all_pending_counts(&mut state);
        debug!(partition = ?self.partition_id, id, "collapsed checkpoints");
    }

    /// Reclaim closed, unreferenced snapshots from the front. Honors
    /// `keep_closed_checkpoints` (a no-op when set); see
    /// [`Self::remove_closed_unreferenced_forced`] for the override.
    pub fn remove_closed_unreferenced(&self) -> ReclaimOutcome {
        if self.config().keep_closed_checkpoints() {
            return ReclaimOutcome {
                items_purged: 0,
                new_open_created: false,
            };
        }
        self.reclaim_locked()
    }

    /// Reclaim regardless of `keep_closed_checkpoints`, for an external
    /// memory-pressure signal (§10.5).
    pub fn remove_closed_unreferenced_forced(&self) -> ReclaimOutcome {
        self.reclaim_locked()
    }

    fn reclaim_locked(&self) -> ReclaimOutcome {
        let mut state = self.state.lock();
        let removed = state.list.drain_reclaimable_front(|s| s.cursor_refcount() == 0);
        let items_purged = removed.iter().map(|s| s.len()).sum();
        if items_purged > 0 {
            debug!(partition = ?self.partition_id, items_purged, "reclaimed closed checkpoints");
        }
        ReclaimOutcome {
            items_purged,
            new_open_created: false,
        }
    }

    pub fn begin_shutdown(&self) {
        self.state.lock().shutting_down = true;
    }

    pub fn uncovered_sentinel(&self) -> Seqno {
        UNCOVERED_SEQNO
    }

    pub fn last_seqno(&self) -> Seqno {
        self.state.lock().list.last_by_seqno()
    }
}

/// Build a meta mutation with a freshly assigned seqno, for brackets the
/// manager writes itself (rotation, collapse) rather than ones it receives.
fn meta_item(list: &mut CheckpointList, partition_id: PartitionId, op: Operation) -> Mutation {
    let seqno = list.assign_next_seqno();
    let mut mutation = Mutation::meta(op, partition_id);
    mutation.set_by_seqno(seqno);
    mutation
}
