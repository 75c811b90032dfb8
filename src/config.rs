use std::mem;

use crate::error::{PoolError, Result};

/// Sizing parameters for the registry and per-pool bookkeeping tables.
///
/// All three tables (registry, node table, gap index) grow the same way: once
/// usage reaches `fill_factor` of the current capacity, the capacity is
/// multiplied by `expand_factor`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  /// Usage ratio that triggers growth.
  pub fill_factor: f32,
  /// Multiplier applied to the capacity on growth.
  pub expand_factor: usize,
  /// Initial number of pool slots in the registry.
  pub registry_capacity: usize,
  /// Initial number of block descriptors per pool.
  pub node_table_capacity: usize,
  /// Initial number of gap index entries per pool.
  pub gap_index_capacity: usize,
  /// Hard cap on the entries of any single table. Growth past it fails with
  /// `OutOfMemory`.
  pub table_limit: Option<usize>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      fill_factor: 0.75,
      expand_factor: 2,
      registry_capacity: 20,
      node_table_capacity: 40,
      gap_index_capacity: 40,
      table_limit: None,
    }
  }
}

impl Config {
  /// Small initial tables, for processes that open many tiny pools.
  pub fn compact() -> Self {
    Self {
      registry_capacity: 4,
      node_table_capacity: 4,
      gap_index_capacity: 4,
      ..Self::default()
    }
  }

  /// Default sizing with every table capped at `limit` entries.
  pub fn bounded(limit: usize) -> Self {
    Self {
      table_limit: Some(limit),
      ..Self::default()
    }
  }

  pub(crate) fn registry_growth(&self) -> Growth {
    self.growth(self.registry_capacity)
  }

  pub(crate) fn node_growth(&self) -> Growth {
    self.growth(self.node_table_capacity)
  }

  pub(crate) fn gap_growth(&self) -> Growth {
    self.growth(self.gap_index_capacity)
  }

  fn growth(
    &self,
    initial: usize,
  ) -> Growth {
    let initial = initial.max(1);
    Growth {
      fill_factor: self.fill_factor.clamp(f32::EPSILON, 1.0),
      expand_factor: self.expand_factor.max(2),
      initial: self.table_limit.map_or(initial, |limit| initial.min(limit)),
      limit: self.table_limit,
    }
  }
}

/// Amortized-doubling rule for one bookkeeping table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Growth {
  fill_factor: f32,
  expand_factor: usize,
  initial: usize,
  limit: Option<usize>,
}

impl Growth {
  pub(crate) fn initial(&self) -> usize {
    self.initial
  }

  /// Capacity needed so that one more entry fits next to `len` entries, or
  /// `None` when `capacity` already suffices.
  pub(crate) fn next_capacity<T>(
    &self,
    len: usize,
    capacity: usize,
  ) -> Result<Option<usize>> {
    let wanted = len + 1;
    if self.limit.is_some_and(|limit| wanted > limit) {
      return Err(PoolError::OutOfMemory {
        requested: wanted.saturating_mul(mem::size_of::<T>()),
      });
    }

    if len < capacity && (len as f32) < capacity as f32 * self.fill_factor {
      return Ok(None);
    }

    let mut target = capacity.saturating_mul(self.expand_factor).max(wanted);
    if let Some(limit) = self.limit {
      target = target.min(limit);
    }

    Ok((target > capacity).then_some(target))
  }
}
