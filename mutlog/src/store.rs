//! External collaborators the checkpoint manager and active stream query
//! when a requested seqno has already been evicted from memory (§6).
//!
//! These are traits, not a concrete disk-backed implementation: the real
//! store lives outside this crate. A lightweight in-memory double is
//! provided under `#[cfg(test)]`, in the same spirit as the teacher's
//! `TestMessageStorage`/`MessageStorage` pattern.

use mutlog_core::{PartitionId, Seqno};

use crate::mutation::Mutation;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store has no data for partition {partition:?}")]
    UnknownPartition { partition: PartitionId },
    #[error("backing store I/O failure")]
    Io(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// In-memory hash table of live keys, consulted by [`Store::dump`] before
/// falling back to disk.
pub trait HashTable {
    /// Look up `key`'s current value without touching disk, if resident.
    fn cache_lookup(&self, partition: PartitionId, key: &[u8]) -> Option<Mutation>;
}

/// Durable backing store consulted once a cursor falls behind the
/// in-memory checkpoint list.
pub trait Store {
    /// Stream every item for `partition` at or after `start_seqno`, in
    /// seqno order. `on_cache_lookup` is offered first for each key so the
    /// caller can skip a disk read when the in-memory hash table is
    /// authoritative; `on_marker` is invoked once with the `[start, end]`
    /// range of the snapshot the dump is replaying before any of its items.
    fn dump(
        &self,
        partition: PartitionId,
        start_seqno: Seqno,
        on_item: &mut dyn FnMut(Mutation) -> Result<()>,
        on_cache_lookup: &mut dyn FnMut(&[u8]) -> Option<Mutation>,
        on_marker: &mut dyn FnMut(Seqno, Seqno) -> Result<()>,
    ) -> Result<()>;

    /// Count of items in `[start_seqno, end_seqno]` for `partition`.
    fn get_num_items(&self, partition: PartitionId, start_seqno: Seqno, end_seqno: Seqno) -> Result<u64>;

    /// Highest seqno durably persisted for `partition`.
    fn get_persistence_seqno(&self, partition: PartitionId) -> Result<Seqno>;
}

#[cfg(test)]
pub mod test_double {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// An in-memory `Store` + `HashTable` double, seeded by seqno order.
    /// Not a real disk-backed implementation — a test fixture only.
    #[derive(Default)]
    pub struct TestStore {
        items: Mutex<HashMap<PartitionId, Vec<Mutation>>>,
        persistence_seqno: Mutex<HashMap<PartitionId, Seqno>>,
    }

    impl TestStore {
        pub fn new() -> TestStore {
            TestStore::default()
        }

        /// Append `mutation` as durably persisted, in seqno order.
        pub fn append(&self, mutation: Mutation) {
            let partition = mutation.partition_id();
            let seqno = mutation.by_seqno();
            let mut items = self.items.lock().expect("lock poisoned");
            items.entry(partition).or_default().push(mutation);
            let mut persisted = self.persistence_seqno.lock().expect("lock poisoned");
            persisted.insert(partition, seqno);
        }

        /// Override the durably-persisted seqno independent of what has
        /// been appended, to simulate a store that is lagging behind (or
        /// has caught up with) what `dump` can already serve.
        pub fn set_persistence_seqno(&self, partition: PartitionId, seqno: Seqno) {
            let mut persisted = self.persistence_seqno.lock().expect("lock poisoned");
            persisted.insert(partition, seqno);
        }
    }

    impl HashTable for TestStore {
        fn cache_lookup(&self, partition: PartitionId, key: &[u8]) -> Option<Mutation> {
            let items = self.items.lock().expect("lock poisoned");
            items
                .get(&partition)?
                .iter()
                .rev()
                .find(|m| m.key() == key)
                .cloned()
        }
    }

    impl Store for TestStore {
        fn dump(
            &self,
            partition: PartitionId,
            start_seqno: Seqno,
            on_item: &mut dyn FnMut(Mutation) -> Result<()>,
            on_cache_lookup: &mut dyn FnMut(&[u8]) -> Option<Mutation>,
            on_marker: &mut dyn FnMut(Seqno, Seqno) -> Result<()>,
        ) -> Result<()> {
            // Collect matches and release the lock before calling back into
            // `on_cache_lookup`, which may itself want to lock `self.items`
            // (the real hash table sits behind a separate lock, but this
            // double shares one map for both roles).
            let matching: Vec<Mutation> = {
                let items = self.items.lock().expect("lock poisoned");
                let Some(all) = items.get(&partition) else {
                    return Err(StoreError::UnknownPartition { partition });
                };
                all.iter().filter(|m| m.by_seqno() >= start_seqno).cloned().collect()
            };
            if let (Some(first), Some(last)) = (matching.first(), matching.last()) {
                on_marker(first.by_seqno(), last.by_seqno())?;
            }
            for mutation in matching {
                if let Some(cached) = on_cache_lookup(mutation.key()) {
                    on_item(cached)?;
                } else {
                    on_item(mutation.clone())?;
                }
            }
            Ok(())
        }

        fn get_num_items(&self, partition: PartitionId, start_seqno: Seqno, end_seqno: Seqno) -> Result<u64> {
            let items = self.items.lock().expect("lock poisoned");
            let Some(all) = items.get(&partition) else {
                return Ok(0);
            };
            Ok(all
                .iter()
                .filter(|m| m.by_seqno() >= start_seqno && m.by_seqno() <= end_seqno)
                .count() as u64)
        }

        fn get_persistence_seqno(&self, partition: PartitionId) -> Result<Seqno> {
            let persisted = self.persistence_seqno.lock().expect("lock poisoned");
            Ok(persisted.get(&partition).copied().unwrap_or(Seqno::from_i64(-1)))
        }
    }
}
