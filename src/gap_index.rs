//! Per-pool index of free blocks, kept sorted ascending by size.
//!
//! Equal sizes are ordered by block offset. Offsets are unique within a pool,
//! so the order is total and repeated runs place allocations identically.

use std::ops::Index;

use crate::{block::Block, config::Growth, error::Result, table::Table};

/// One free block as seen by the fit search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Gap {
  pub size: usize,
  pub offset: usize,
  /// Node table index of the free block.
  pub block: usize,
}

impl Gap {
  fn key(&self) -> (usize, usize) {
    (self.size, self.offset)
  }
}

#[derive(Debug)]
pub(crate) struct GapIndex {
  gaps: Table<Gap>,
}

impl GapIndex {
  pub(crate) fn new(growth: Growth) -> Result<Self> {
    Ok(Self {
      gaps: Table::new(growth)?,
    })
  }

  pub(crate) fn len(&self) -> usize {
    self.gaps.len()
  }

  pub(crate) fn capacity(&self) -> usize {
    self.gaps.capacity()
  }

  pub(crate) fn iter(&self) -> impl Iterator<Item = &Gap> {
    self.gaps.iter()
  }

  /// The largest gap, i.e. the last entry.
  pub(crate) fn largest(&self) -> Option<&Gap> {
    self.gaps.last()
  }

  /// Makes sure the next `insert` cannot fail.
  pub(crate) fn reserve_one(&mut self) -> Result<()> {
    self.gaps.reserve_one()
  }

  /// Indexes the free block stored in node table slot `index`.
  pub(crate) fn insert(
    &mut self,
    index: usize,
    block: &Block,
  ) -> Result<()> {
    self.gaps.push(Gap {
      size: block.size,
      offset: block.offset,
      block: index,
    })?;
    self.sort();
    Ok(())
  }

  /// Removes the entry at `position` by swapping in the last one.
  pub(crate) fn remove(
    &mut self,
    position: usize,
  ) -> Gap {
    let gap = self.gaps.swap_remove(position);
    self.sort();
    gap
  }

  /// Removes the entry for node table slot `block`, if indexed.
  pub(crate) fn remove_block(
    &mut self,
    block: usize,
  ) -> Option<Gap> {
    let position = self.position_of(block)?;
    Some(self.remove(position))
  }

  /// Points the entry at `position` to a new block and extent.
  pub(crate) fn resize(
    &mut self,
    position: usize,
    index: usize,
    block: &Block,
  ) {
    self.gaps[position] = Gap {
      size: block.size,
      offset: block.offset,
      block: index,
    };
    self.sort();
  }

  /// Re-targets the entry of node table slot `old` to slot `index`, whose
  /// extent may have changed. Returns `false` if `old` was not indexed.
  pub(crate) fn retarget(
    &mut self,
    old: usize,
    index: usize,
    block: &Block,
  ) -> bool {
    match self.position_of(old) {
      Some(position) => {
        self.resize(position, index, block);
        true
      }
      None => false,
    }
  }

  pub(crate) fn position_of(
    &self,
    block: usize,
  ) -> Option<usize> {
    self.gaps.iter().position(|gap| gap.block == block)
  }

  /// Position of the smallest gap of at least `size` bytes. Among equal sizes
  /// the lowest address wins.
  pub(crate) fn best_fit(
    &self,
    size: usize,
  ) -> Option<usize> {
    let position = self.gaps.partition_point(|gap| gap.size < size);
    (position < self.gaps.len()).then_some(position)
  }

  /// Position of the lowest-addressed gap of at least `size` bytes.
  pub(crate) fn first_fit(
    &self,
    size: usize,
  ) -> Option<usize> {
    self
      .iter()
      .enumerate()
      .filter(|(_, gap)| gap.size >= size)
      .min_by_key(|(_, gap)| gap.offset)
      .map(|(position, _)| position)
  }

  pub(crate) fn sort(&mut self) {
    self.gaps.sort_unstable_by_key(Gap::key);
  }

  /// First position whose entry sorts before its predecessor.
  pub(crate) fn unsorted_at(&self) -> Option<usize> {
    self
      .gaps
      .windows(2)
      .position(|pair| pair[0].key() > pair[1].key())
      .map(|position| position + 1)
  }
}

impl Index<usize> for GapIndex {
  type Output = Gap;

  fn index(
    &self,
    position: usize,
  ) -> &Gap {
    &self.gaps[position]
  }
}
