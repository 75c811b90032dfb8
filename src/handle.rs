use std::fmt;

/// Identifies an open pool inside a [`Registry`](crate::Registry).
///
/// Ids are never reused by the registry that issued them, so a handle to a
/// closed pool keeps failing with `NotFound` even after new pools are opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolHandle(u64);

impl PoolHandle {
  pub const fn from_raw(id: u64) -> Self {
    Self(id)
  }

  pub const fn as_raw(self) -> u64 {
    self.0
  }
}

impl fmt::Display for PoolHandle {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "pool#{}", self.0)
  }
}

/// Opaque reference to a live allocation.
///
/// The `generation` is bumped on every state change of the underlying slot,
/// so a handle that outlived its allocation is rejected instead of aliasing
/// whatever block occupies the slot now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AllocHandle {
  pub(crate) pool: PoolHandle,
  pub(crate) index: usize,
  pub(crate) generation: u32,
}

impl AllocHandle {
  /// The pool this allocation was made from.
  pub fn pool(&self) -> PoolHandle {
    self.pool
  }
}
