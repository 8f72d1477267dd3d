//! The seam between an [`crate::active_stream::ActiveStream`] and its
//! partition's checkpoint manager / backing store, so the state machine
//! itself stays free of locking and I/O concerns.

use std::sync::Arc;

use mutlog_core::{PartitionId, Seqno};

use crate::error::ManagerError;
use crate::manager::{CheckpointManager, CursorRegistration, NextItem};
use crate::mutation::Mutation;
use crate::store::{HashTable, Store, StoreError};

pub struct StreamContext<S, H> {
    manager: Arc<CheckpointManager>,
    store: Arc<S>,
    hash_table: Arc<H>,
}

impl<S, H> StreamContext<S, H>
where
    S: Store,
    H: HashTable,
{
    pub fn new(manager: Arc<CheckpointManager>, store: Arc<S>, hash_table: Arc<H>) -> StreamContext<S, H> {
        StreamContext {
            manager,
            store,
            hash_table,
        }
    }

    pub fn partition_id(&self) -> PartitionId {
        self.manager.partition_id()
    }

    pub fn register_cursor_by_seqno(&self, name: &str, start_seqno: Seqno) -> Result<CursorRegistration, ManagerError> {
        self.manager.register_cursor_by_seqno(name.to_string(), start_seqno)
    }

    pub fn remove_cursor(&self, name: &str) -> bool {
        self.manager.remove_cursor(name)
    }

    pub fn next_item(&self, name: &str) -> Result<Option<NextItem>, ManagerError> {
        self.manager.next_item(name)
    }

    pub fn uncovered_sentinel(&self) -> Seqno {
        self.manager.uncovered_sentinel()
    }

    pub fn last_seqno(&self) -> Seqno {
        self.manager.last_seqno()
    }

    /// Stream `[start_seqno, end_seqno]` from the backing store, consulting
    /// the hash table for each key before falling back to the dumped value.
    pub fn backfill(
        &self,
        start_seqno: Seqno,
        mut on_item: impl FnMut(Mutation),
        mut on_marker: impl FnMut(Seqno, Seqno),
    ) -> Result<(), StoreError> {
        let partition = self.partition_id();
        let hash_table = &self.hash_table;
        self.store.dump(
            partition,
            start_seqno,
            &mut |mutation| {
                on_item(mutation);
                Ok(())
            },
            &mut |key| hash_table.cache_lookup(partition, key),
            &mut |start, end| {
                on_marker(start, end);
                Ok(())
            },
        )
    }

    pub fn persisted_seqno(&self) -> Result<Seqno, StoreError> {
        self.store.get_persistence_seqno(self.partition_id())
    }
}
