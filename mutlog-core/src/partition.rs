/// A shard identifier (`vb`) used to partition the keyspace.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId(u16);

impl PartitionId {
    pub fn from_u16(id: u16) -> PartitionId {
        PartitionId(id)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Uniquely identifies a partition across replicas; carried on the wire so
/// consumers can detect a partition recreated with a different identity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct PartitionUuid(u64);

impl PartitionUuid {
    pub fn from_u64(id: u64) -> PartitionUuid {
        PartitionUuid(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}
