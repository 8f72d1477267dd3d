/// A monotone, per-partition mutation sequence number.
///
/// `by_seqno` is assigned by the checkpoint manager at enqueue time and is
/// unique and strictly increasing within a partition for the entire
/// lifetime of the manager. Meta items (Dummy, SnapshotStart, SnapshotEnd)
/// also consume a seqno.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seqno(i64);

/// Sentinel returned when a cursor registration request cannot be
/// satisfied by any snapshot currently retained by the manager.
pub const UNCOVERED_SEQNO: Seqno = Seqno(i64::MAX);

impl Seqno {
    pub const ZERO: Seqno = Seqno(0);

    pub fn from_i64(n: i64) -> Seqno {
        Seqno(n)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn successor(&self) -> Seqno {
        Seqno(self.0 + 1)
    }

    pub fn predecessor(&self) -> Seqno {
        Seqno(self.0 - 1)
    }

    pub fn is_uncovered(&self) -> bool {
        *self == UNCOVERED_SEQNO
    }
}

impl std::fmt::Display for Seqno {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A revision counter carried with each mutation, used by the store for
/// conflict resolution. Opaque to the checkpoint manager and stream engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RevSeqno(u64);

impl RevSeqno {
    pub fn from_u64(n: u64) -> RevSeqno {
        RevSeqno(n)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}
