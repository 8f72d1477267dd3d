//! The immutable record that flows through the checkpoint manager.

use std::time::{Instant, SystemTime};

use mutlog_core::{PartitionId, RevSeqno, Seqno};

/// Kind of operation a [`Mutation`] represents.
///
/// `SnapshotStart`, `SnapshotEnd` and `Dummy` are meta items: they bracket a
/// snapshot's data items, consume a seqno like any other mutation, but carry
/// no key and are never indexed for dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Set,
    Delete,
    Expire,
    SnapshotStart,
    SnapshotEnd,
    Dummy,
}

impl Operation {
    /// Meta items bracket snapshots; they carry no key and are not indexed.
    pub fn is_meta(&self) -> bool {
        matches!(
            self,
            Operation::SnapshotStart | Operation::SnapshotEnd | Operation::Dummy
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    key: Vec<u8>,
    value: Option<Vec<u8>>,
    op: Operation,
    by_seqno: Seqno,
    rev_seqno: RevSeqno,
    partition_id: PartitionId,
    queued_time: Instant,
    queued_at: SystemTime,
}

impl Mutation {
    /// Build a data mutation (`Set`, `Delete`, `Expire`). `by_seqno` is left
    /// at zero; the manager assigns the real value at enqueue time.
    pub fn data(
        op: Operation,
        key: Vec<u8>,
        value: Option<Vec<u8>>,
        rev_seqno: RevSeqno,
        partition_id: PartitionId,
    ) -> Mutation {
        debug_assert!(!op.is_meta());
        Mutation {
            key,
            value,
            op,
            by_seqno: Seqno::ZERO,
            rev_seqno,
            partition_id,
            queued_time: Instant::now(),
            queued_at: SystemTime::now(),
        }
    }

    pub fn set(key: Vec<u8>, value: Vec<u8>, rev_seqno: RevSeqno, partition_id: PartitionId) -> Mutation {
        Mutation::data(Operation::Set, key, Some(value), rev_seqno, partition_id)
    }

    pub fn delete(key: Vec<u8>, rev_seqno: RevSeqno, partition_id: PartitionId) -> Mutation {
        Mutation::data(Operation::Delete, key, None, rev_seqno, partition_id)
    }

    pub fn expire(key: Vec<u8>, rev_seqno: RevSeqno, partition_id: PartitionId) -> Mutation {
        Mutation::data(Operation::Expire, key, None, rev_seqno, partition_id)
    }

    /// Build a meta item (`Dummy`, `SnapshotStart`, `SnapshotEnd`).
    pub fn meta(op: Operation, partition_id: PartitionId) -> Mutation {
        debug_assert!(op.is_meta());
        Mutation {
            key: Vec::new(),
            value: None,
            op,
            by_seqno: Seqno::ZERO,
            rev_seqno: RevSeqno::default(),
            partition_id,
            queued_time: Instant::now(),
            queued_at: SystemTime::now(),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn op(&self) -> Operation {
        self.op
    }

    pub fn by_seqno(&self) -> Seqno {
        self.by_seqno
    }

    pub fn rev_seqno(&self) -> RevSeqno {
        self.rev_seqno
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    pub fn queued_time(&self) -> Instant {
        self.queued_time
    }

    pub fn queued_at(&self) -> SystemTime {
        self.queued_at
    }

    /// Assign the seqno under which this mutation was accepted into its
    /// snapshot. Only the checkpoint manager calls this.
    pub(crate) fn set_by_seqno(&mut self, seqno: Seqno) {
        self.by_seqno = seqno;
    }

    pub fn is_meta(&self) -> bool {
        self.op.is_meta()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_items_have_no_key() {
        let m = Mutation::meta(Operation::Dummy, PartitionId::from_u16(0));
        assert!(m.key().is_empty());
        assert!(m.is_meta());
    }

    #[test]
    fn test_data_mutation_is_not_meta() {
        let m = Mutation::set(
            b"key1".to_vec(),
            b"value".to_vec(),
            RevSeqno::from_u64(1),
            PartitionId::from_u16(0),
        );
        assert!(!m.is_meta());
        assert_eq!(m.value(), Some(&b"value"[..]));
    }
}
