//! The allocator engine.
//!
//! A [`Pool`] drives its node table and gap index together: allocation
//! splits the chosen gap, deallocation coalesces the freed block with any
//! free address neighbour. Every operation either completes or returns an
//! error before touching any bookkeeping.

use std::{collections::HashMap, fmt};

use tracing::{trace, warn};

use crate::{
  backing::{BackingAllocator, RawBuffer},
  block::{Block, BlockState},
  config::Config,
  error::{InvariantViolation, PoolError, Result},
  gap_index::{Gap, GapIndex},
  handle::{AllocHandle, PoolHandle},
  node_table::NodeTable,
};

/// Placement policy used by [`Pool::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
  /// The lowest-addressed gap that is large enough.
  FirstFit,
  /// The smallest gap that is large enough; the lowest address wins ties.
  BestFit,
}

impl fmt::Display for Policy {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.write_str(match self {
      Policy::FirstFit => "first-fit",
      Policy::BestFit => "best-fit",
    })
  }
}

/// One block of a pool, as reported by [`Pool::inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
  pub offset: usize,
  pub size: usize,
  pub allocated: bool,
}

/// Point-in-time counters of a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStats {
  pub capacity: usize,
  pub policy: Policy,
  /// Live allocations.
  pub num_allocs: usize,
  /// Bytes held by live allocations.
  pub total_size: usize,
  /// Free blocks.
  pub num_gaps: usize,
  pub free_bytes: usize,
  pub largest_gap: usize,
  /// Node table slots ever used, live or tombstoned.
  pub node_slots: usize,
  pub node_capacity: usize,
  pub gap_capacity: usize,
}

impl PoolStats {
  /// Share of free bytes that lie outside the largest gap, from 0.0 (one
  /// contiguous gap) towards 1.0.
  pub fn fragmentation(&self) -> f32 {
    if self.free_bytes == 0 {
      0.0
    } else {
      1.0 - self.largest_gap as f32 / self.free_bytes as f32
    }
  }
}

/// A fixed-capacity arena carved into variable-size blocks.
pub struct Pool {
  handle: PoolHandle,
  policy: Policy,
  num_allocs: usize,
  total_size: usize,
  buffer: RawBuffer,
  nodes: NodeTable,
  gaps: GapIndex,
}

impl Pool {
  /// Builds the bookkeeping for a pool of `capacity` bytes, then obtains its
  /// arena from `backing`.
  pub(crate) fn open<B: BackingAllocator + ?Sized>(
    handle: PoolHandle,
    capacity: usize,
    policy: Policy,
    config: &Config,
    backing: &mut B,
  ) -> Result<Self> {
    if capacity == 0 {
      return Err(PoolError::ZeroSize);
    }

    let mut nodes = NodeTable::new(config.node_growth())?;
    let mut gaps = GapIndex::new(config.gap_growth())?;
    let root = nodes.append(Block::free(0, capacity))?;
    gaps.insert(root, &nodes[root])?;

    let buffer = backing.acquire(capacity)?;
    if buffer.len() != capacity {
      warn!(
        pool = %handle,
        requested = capacity,
        got = buffer.len(),
        "backing allocator returned a buffer of the wrong size"
      );
      backing.release(buffer);
      return Err(PoolError::OutOfMemory {
        requested: capacity,
      });
    }

    Ok(Self {
      handle,
      policy,
      num_allocs: 0,
      total_size: 0,
      buffer,
      nodes,
      gaps,
    })
  }

  /// Gives up the arena so the registry can return it to its backing
  /// allocator.
  pub(crate) fn into_buffer(self) -> RawBuffer {
    self.buffer
  }

  pub fn handle(&self) -> PoolHandle {
    self.handle
  }

  pub fn capacity(&self) -> usize {
    self.buffer.len()
  }

  pub fn policy(&self) -> Policy {
    self.policy
  }

  pub fn num_allocs(&self) -> usize {
    self.num_allocs
  }

  /// Bytes currently allocated.
  pub fn total_size(&self) -> usize {
    self.total_size
  }

  pub fn num_gaps(&self) -> usize {
    self.gaps.len()
  }

  pub fn free_bytes(&self) -> usize {
    self.capacity() - self.total_size
  }

  /// Size of the largest free block, 0 when the pool is full.
  pub fn largest_gap(&self) -> usize {
    self.gaps.largest().map_or(0, |gap| gap.size)
  }

  pub fn stats(&self) -> PoolStats {
    PoolStats {
      capacity: self.capacity(),
      policy: self.policy,
      num_allocs: self.num_allocs,
      total_size: self.total_size,
      num_gaps: self.gaps.len(),
      free_bytes: self.free_bytes(),
      largest_gap: self.largest_gap(),
      node_slots: self.nodes.slot_count(),
      node_capacity: self.nodes.capacity(),
      gap_capacity: self.gaps.capacity(),
    }
  }

  /// Carves `size` bytes out of a gap chosen by the pool's policy.
  ///
  /// The allocation takes the low end of the gap; whatever is left becomes a
  /// new free block right after it.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<AllocHandle> {
    if size == 0 {
      return Err(PoolError::ZeroSize);
    }

    let fit = match self.policy {
      Policy::FirstFit => self.gaps.first_fit(size),
      Policy::BestFit => self.gaps.best_fit(size),
    };
    let Some(position) = fit else {
      trace!(pool = %self.handle, size, "no gap large enough");
      return Err(PoolError::PoolFull {
        requested: size,
        largest_gap: self.largest_gap(),
      });
    };

    let gap = self.gaps[position];
    let index = gap.block;
    let split = gap.size > size;

    if split {
      // Taking the remainder slot is the only fallible step, so it goes first.
      let remainder = self
        .nodes
        .insert_after(index, Block::free(gap.offset + size, gap.size - size))?;
      self.nodes[index].size = size;
      self.gaps.resize(position, remainder, &self.nodes[remainder]);
    } else {
      self.gaps.remove(position);
    }

    let generation = self.nodes.transition(index, BlockState::Allocated);
    self.num_allocs += 1;
    self.total_size += size;

    trace!(pool = %self.handle, offset = gap.offset, size, split, "allocated");
    self.debug_check();

    Ok(AllocHandle {
      pool: self.handle,
      index,
      generation,
    })
  }

  /// Returns an allocation to the pool and merges it with free neighbours.
  pub fn deallocate(
    &mut self,
    handle: AllocHandle,
  ) -> Result<()> {
    let index = self.resolve(handle)?;
    let block = self.nodes[index];
    let prev = block.prev.filter(|&prev| self.nodes[prev].is_free());
    let next = block.next.filter(|&next| self.nodes[next].is_free());

    // Only an isolated block needs a new gap entry.
    if prev.is_none() && next.is_none() {
      self.gaps.reserve_one()?;
    }

    self.nodes.transition(index, BlockState::Free);

    let survivor = match (prev, next) {
      (None, None) => {
        self.gaps.insert(index, &self.nodes[index])?;
        index
      }
      (Some(prev), None) => {
        self.nodes[prev].size += block.size;
        self.nodes.reclaim(index);
        self.retarget_gap(prev, prev);
        prev
      }
      (None, Some(next)) => {
        let absorbed = self.nodes[next].size;
        self.nodes[index].size += absorbed;
        self.nodes.reclaim(next);
        self.retarget_gap(next, index);
        index
      }
      (Some(prev), Some(next)) => {
        let absorbed = block.size + self.nodes[next].size;
        self.nodes[prev].size += absorbed;
        self.nodes.reclaim(index);
        self.nodes.reclaim(next);
        let dropped = self.gaps.remove_block(next);
        debug_assert!(dropped.is_some(), "free slot {next} missing from gap index");
        self.retarget_gap(prev, prev);
        prev
      }
    };

    self.num_allocs -= 1;
    self.total_size -= block.size;

    trace!(
      pool = %self.handle,
      offset = block.offset,
      size = block.size,
      merged_prev = prev.is_some(),
      merged_next = next.is_some(),
      gap = self.nodes[survivor].size,
      "deallocated"
    );
    self.debug_check();

    Ok(())
  }

  /// Size of a live allocation.
  pub fn block_size(
    &self,
    handle: AllocHandle,
  ) -> Result<usize> {
    let index = self.resolve(handle)?;
    Ok(self.nodes[index].size)
  }

  /// Byte offset of a live allocation from the start of the arena.
  pub fn offset(
    &self,
    handle: AllocHandle,
  ) -> Result<usize> {
    let index = self.resolve(handle)?;
    Ok(self.nodes[index].offset)
  }

  /// The memory of a live allocation.
  pub fn bytes(
    &self,
    handle: AllocHandle,
  ) -> Result<&[u8]> {
    let index = self.resolve(handle)?;
    let block = &self.nodes[index];
    Ok(&self.buffer.as_slice()[block.offset..block.end()])
  }

  pub fn bytes_mut(
    &mut self,
    handle: AllocHandle,
  ) -> Result<&mut [u8]> {
    let index = self.resolve(handle)?;
    let block = self.nodes[index];
    Ok(&mut self.buffer.as_mut_slice()[block.offset..block.end()])
  }

  /// Every block in ascending address order.
  pub fn inspect(&self) -> Vec<Segment> {
    self
      .nodes
      .iter()
      .map(|(_, block)| Segment {
        offset: block.offset,
        size: block.size,
        allocated: !block.is_free(),
      })
      .collect()
  }

  /// Verifies the block list, the gap index and the counters against each
  /// other.
  pub fn check_invariants(&self) -> std::result::Result<(), InvariantViolation> {
    let mut expected = 0;
    let mut visited = 0;
    let mut free_blocks = 0;
    let mut allocs = 0;
    let mut bytes = 0;
    let mut prev: Option<(usize, &Block)> = None;
    let indexed: HashMap<usize, &Gap> = self.gaps.iter().map(|gap| (gap.block, gap)).collect();

    for (index, block) in self.nodes.iter() {
      if visited == self.nodes.len() {
        return Err(InvariantViolation::LostBlocks {
          visited: visited + 1,
          live: self.nodes.len(),
        });
      }
      if block.prev != prev.map(|(prev, _)| prev) {
        return Err(InvariantViolation::BrokenLink { index });
      }
      if block.offset != expected {
        return Err(match prev {
          None => InvariantViolation::BadStart {
            offset: block.offset,
          },
          Some(_) => InvariantViolation::Discontiguous {
            offset: block.offset,
            expected,
          },
        });
      }

      match block.state {
        BlockState::Free => {
          if let Some((_, before)) = prev {
            if before.is_free() {
              return Err(InvariantViolation::AdjacentGaps {
                first: before.offset,
                second: block.offset,
              });
            }
          }
          let gap = indexed.get(&index);
          if gap.is_none_or(|gap| gap.size != block.size || gap.offset != block.offset) {
            return Err(InvariantViolation::MissingGap {
              offset: block.offset,
            });
          }
          free_blocks += 1;
        }
        BlockState::Allocated => {
          allocs += 1;
          bytes += block.size;
        }
      }

      expected = block.end();
      visited += 1;
      prev = Some((index, block));
    }

    if expected != self.capacity() {
      return Err(InvariantViolation::Coverage {
        covered: expected,
        capacity: self.capacity(),
      });
    }
    if visited != self.nodes.len() {
      return Err(InvariantViolation::LostBlocks {
        visited,
        live: self.nodes.len(),
      });
    }
    if self.gaps.len() != free_blocks {
      return Err(InvariantViolation::GapCount {
        gaps: self.gaps.len(),
        free_blocks,
      });
    }
    if let Some(position) = self.gaps.unsorted_at() {
      return Err(InvariantViolation::Unsorted { position });
    }
    if allocs != self.num_allocs || bytes != self.total_size {
      return Err(InvariantViolation::Accounting {
        reported_allocs: self.num_allocs,
        reported_bytes: self.total_size,
        actual_allocs: allocs,
        actual_bytes: bytes,
      });
    }

    Ok(())
  }

  /// Maps a handle to its node table slot if it names a live allocation of
  /// this pool.
  fn resolve(
    &self,
    handle: AllocHandle,
  ) -> Result<usize> {
    if handle.pool != self.handle {
      return Err(PoolError::InvalidHandle);
    }

    match self.nodes.get(handle.index) {
      Some((generation, block))
        if generation == handle.generation && block.state == BlockState::Allocated =>
      {
        Ok(handle.index)
      }
      _ => Err(PoolError::InvalidHandle),
    }
  }

  fn retarget_gap(
    &mut self,
    old: usize,
    index: usize,
  ) {
    let found = self.gaps.retarget(old, index, &self.nodes[index]);
    debug_assert!(found, "free slot {old} missing from gap index");
  }

  fn debug_check(&self) {
    if cfg!(debug_assertions) {
      if let Err(violation) = self.check_invariants() {
        panic!("{} bookkeeping corrupted: {violation}", self.handle);
      }
    }
  }
}

impl fmt::Debug for Pool {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Pool")
      .field("handle", &self.handle)
      .field("policy", &self.policy)
      .field("capacity", &self.capacity())
      .field("num_allocs", &self.num_allocs)
      .field("total_size", &self.total_size)
      .field("num_gaps", &self.gaps.len())
      .finish()
  }
}

impl fmt::Display for Pool {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(
      f,
      "{} ({}): {}/{} bytes in {} allocations, {} gaps",
      self.handle,
      self.policy,
      self.total_size,
      self.capacity(),
      self.num_allocs,
      self.gaps.len()
    )?;

    for segment in self.inspect() {
      writeln!(
        f,
        "  {:>12}  {:>12}  {}",
        segment.offset,
        segment.size,
        if segment.allocated { "allocated" } else { "free" }
      )?;
    }

    Ok(())
  }
}
