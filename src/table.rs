use std::{
  mem,
  ops::{Deref, DerefMut},
};

use crate::{
  config::Growth,
  error::{PoolError, Result},
};

/// A `Vec` that only grows through its [`Growth`] rule and reports growth
/// failure as `OutOfMemory` instead of aborting.
///
/// Growth reserves the new buffer first and only commits the new capacity on
/// success, so a failed `reserve_one` leaves the table untouched.
#[derive(Debug)]
pub(crate) struct Table<T> {
  entries: Vec<T>,
  capacity: usize,
  growth: Growth,
}

impl<T> Table<T> {
  pub(crate) fn new(growth: Growth) -> Result<Self> {
    let capacity = growth.initial();
    let mut entries = Vec::new();
    entries
      .try_reserve_exact(capacity)
      .map_err(|_| out_of_memory::<T>(capacity))?;

    Ok(Self {
      entries,
      capacity,
      growth,
    })
  }

  /// Logical capacity, as driven by the growth rule.
  pub(crate) fn capacity(&self) -> usize {
    self.capacity
  }

  /// Makes sure the next `push` cannot fail.
  pub(crate) fn reserve_one(&mut self) -> Result<()> {
    let Some(target) = self
      .growth
      .next_capacity::<T>(self.entries.len(), self.capacity)?
    else {
      return Ok(());
    };

    let additional = target - self.entries.len();
    self
      .entries
      .try_reserve_exact(additional)
      .map_err(|_| out_of_memory::<T>(target))?;
    self.capacity = target;

    tracing::trace!(
      capacity = target,
      entry_size = mem::size_of::<T>(),
      "grew bookkeeping table"
    );
    Ok(())
  }

  /// Appends `value` and returns its index.
  pub(crate) fn push(
    &mut self,
    value: T,
  ) -> Result<usize> {
    self.reserve_one()?;
    self.entries.push(value);
    Ok(self.entries.len() - 1)
  }

  pub(crate) fn swap_remove(
    &mut self,
    index: usize,
  ) -> T {
    self.entries.swap_remove(index)
  }

  pub(crate) fn into_entries(self) -> Vec<T> {
    self.entries
  }
}

impl<T> Deref for Table<T> {
  type Target = [T];

  fn deref(&self) -> &[T] {
    &self.entries
  }
}

impl<T> DerefMut for Table<T> {
  fn deref_mut(&mut self) -> &mut [T] {
    &mut self.entries
  }
}

fn out_of_memory<T>(entries: usize) -> PoolError {
  PoolError::OutOfMemory {
    requested: entries.saturating_mul(mem::size_of::<T>()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Config;

  #[test]
  fn test_doubles_at_fill_factor() {
    let config = Config {
      node_table_capacity: 4,
      ..Config::default()
    };
    let mut table: Table<u32> = Table::new(config.node_growth()).unwrap();

    for value in 0..3 {
      table.push(value).unwrap();
    }
    assert_eq!(table.capacity(), 4);

    // 3 of 4 hits the 75% threshold.
    table.push(3).unwrap();
    assert_eq!(table.capacity(), 8);
    assert_eq!(&table[..], &[0, 1, 2, 3]);
  }

  #[test]
  fn test_limit_leaves_table_untouched() {
    let mut table: Table<u64> = Table::new(Config::bounded(2).node_growth()).unwrap();

    table.push(1).unwrap();
    table.push(2).unwrap();

    assert_eq!(
      table.push(3),
      Err(PoolError::OutOfMemory { requested: 24 })
    );
    assert_eq!(&table[..], &[1, 2]);
    assert_eq!(table.capacity(), 2);
  }
}
