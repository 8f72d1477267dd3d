//! Consumer-facing framed messages a stream yields (§6).

use mutlog_core::{PartitionId, PartitionUuid, RevSeqno, Seqno};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFlags {
    Disk,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotMarker {
    pub opaque: u32,
    pub partition: PartitionId,
    pub start_seqno: Seqno,
    pub end_seqno: Seqno,
    pub flags: SnapshotFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationMessage {
    pub opaque: u32,
    pub partition: PartitionId,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub by_seqno: Seqno,
    pub rev_seqno: RevSeqno,
    pub exptime: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletionMessage {
    pub opaque: u32,
    pub partition: PartitionId,
    pub key: Vec<u8>,
    pub by_seqno: Seqno,
    pub rev_seqno: RevSeqno,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpirationMessage {
    pub opaque: u32,
    pub partition: PartitionId,
    pub key: Vec<u8>,
    pub by_seqno: Seqno,
    pub rev_seqno: RevSeqno,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VBucketState {
    Active,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetVBucketStateMessage {
    pub opaque: u32,
    pub partition: PartitionId,
    pub state: VBucketState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEndReason {
    Ok,
    Closed,
    StateChanged,
    Disconnected,
    BackfillFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEndMessage {
    pub opaque: u32,
    pub partition: PartitionId,
    pub reason: StreamEndReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Marker(SnapshotMarker),
    Mutation(MutationMessage),
    Deletion(DeletionMessage),
    Expiration(ExpirationMessage),
    SetVBucketState(SetVBucketStateMessage),
    StreamEnd(StreamEndMessage),
}

/// Identifies one partition's replica lineage; carried by takeover and
/// backfill bookkeeping so a consumer can detect a partition rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionIdentity {
    pub partition: PartitionId,
    pub uuid: PartitionUuid,
}
