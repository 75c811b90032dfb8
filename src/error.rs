use crate::handle::PoolHandle;

/// Errors returned by the registry and pool operations.
///
/// Every failing call leaves the registry and the affected pool exactly as
/// they were before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
  #[error("registry is already initialized")]
  AlreadyInitialized,

  #[error("registry is not initialized")]
  NotInitialized,

  /// The backing allocator or a bookkeeping table could not provide memory.
  #[error("out of memory: failed to obtain {requested} bytes")]
  OutOfMemory { requested: usize },

  /// No gap in the pool is large enough for the request.
  #[error("pool full: requested {requested} bytes, largest gap is {largest_gap} bytes")]
  PoolFull { requested: usize, largest_gap: usize },

  #[error("{0} is not registered")]
  NotFound(PoolHandle),

  #[error("pool still has {live} live allocations")]
  PoolBusy { live: usize },

  /// The handle does not refer to a live allocation of this pool.
  #[error("allocation handle is stale or belongs to another pool")]
  InvalidHandle,

  #[error("zero-sized pools and allocations are not supported")]
  ZeroSize,
}

pub type Result<T> = std::result::Result<T, PoolError>;

/// A broken bookkeeping invariant, reported by [`Pool::check_invariants`].
///
/// [`Pool::check_invariants`]: crate::Pool::check_invariants
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
  #[error("block list does not start at offset 0 (starts at {offset})")]
  BadStart { offset: usize },

  #[error("block at offset {offset} does not follow the previous block ending at {expected}")]
  Discontiguous { offset: usize, expected: usize },

  #[error("blocks cover {covered} bytes of a {capacity}-byte pool")]
  Coverage { covered: usize, capacity: usize },

  #[error("slot {index} has an inconsistent back link")]
  BrokenLink { index: usize },

  #[error("block list visits {visited} blocks but the node table holds {live}")]
  LostBlocks { visited: usize, live: usize },

  #[error("free blocks at offsets {first} and {second} were not coalesced")]
  AdjacentGaps { first: usize, second: usize },

  #[error("free block at offset {offset} has no matching gap index entry")]
  MissingGap { offset: usize },

  #[error("gap index holds {gaps} entries for {free_blocks} free blocks")]
  GapCount { gaps: usize, free_blocks: usize },

  #[error("gap index is out of order at position {position}")]
  Unsorted { position: usize },

  #[error("pool reports {reported_allocs} allocations / {reported_bytes} bytes, blocks hold {actual_allocs} / {actual_bytes}")]
  Accounting {
    reported_allocs: usize,
    reported_bytes: usize,
    actual_allocs: usize,
    actual_bytes: usize,
  },
}
