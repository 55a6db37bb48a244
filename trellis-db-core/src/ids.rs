//! Id aliases for the trellis id spaces.

/// Node identifier.
pub type Uid = u64;

/// Shard identifier. Each shard owns a partition of the attribute space and
/// answers authoritatively for it.
pub type ShardId = u32;

/// One row of node identifiers.
///
/// Order is meaningful: it is the pagination input order, and ties among
/// equal sort values preserve it.
pub type UidList = Vec<Uid>;

/// A matrix of uid rows. Each row is an independent pagination unit; results
/// come back in input row order.
pub type UidMatrix = Vec<UidList>;
