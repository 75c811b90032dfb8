//! Pool lifecycle.
//!
//! A [`Registry`] is an explicit context object: the application owns it and
//! passes it around, so independent registries can coexist (one per
//! subsystem, one per test).

use tracing::{debug, warn};

use crate::{
  backing::{BackingAllocator, LibcBacking},
  config::Config,
  error::{PoolError, Result},
  handle::{AllocHandle, PoolHandle},
  pool::{Policy, Pool, Segment},
  table::Table,
};

/// Table of open pools plus the allocator their arenas come from.
///
/// Closing a pool that still has live allocations fails with
/// [`PoolError::PoolBusy`]; only [`Registry::teardown`] (and dropping the
/// registry) releases busy pools.
pub struct Registry<B: BackingAllocator = LibcBacking> {
  backing: B,
  config: Config,
  pools: Option<Table<Pool>>,
  next_id: u64,
}

impl Registry<LibcBacking> {
  /// An uninitialized registry backed by the C heap.
  pub fn new() -> Self {
    Self::with_config(Config::default())
  }

  pub fn with_config(config: Config) -> Self {
    Self::with_backing(LibcBacking, config)
  }
}

impl Default for Registry<LibcBacking> {
  fn default() -> Self {
    Self::new()
  }
}

impl<B: BackingAllocator> Registry<B> {
  pub fn with_backing(
    backing: B,
    config: Config,
  ) -> Self {
    Self {
      backing,
      config,
      pools: None,
      next_id: 0,
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn backing(&self) -> &B {
    &self.backing
  }

  pub fn is_initialized(&self) -> bool {
    self.pools.is_some()
  }

  /// Number of open pools.
  pub fn len(&self) -> usize {
    self.pools.as_ref().map_or(0, |pools| pools.len())
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn init(&mut self) -> Result<()> {
    if self.pools.is_some() {
      return Err(PoolError::AlreadyInitialized);
    }

    let pools = Table::new(self.config.registry_growth())?;
    debug!(capacity = pools.capacity(), "registry initialized");
    self.pools = Some(pools);
    Ok(())
  }

  /// Releases every open pool, busy or not, and returns the registry to the
  /// uninitialized state.
  pub fn teardown(&mut self) -> Result<()> {
    let pools = self.pools.take().ok_or(PoolError::NotInitialized)?;

    let mut forced = 0;
    for pool in pools.into_entries() {
      if pool.num_allocs() > 0 {
        warn!(
          pool = %pool.handle(),
          live = pool.num_allocs(),
          "releasing pool with live allocations"
        );
        forced += 1;
      }
      self.backing.release(pool.into_buffer());
    }

    debug!(forced, "registry torn down");
    Ok(())
  }

  /// Opens a pool of `capacity` bytes, initializing the registry first if
  /// needed. On failure the registry is left as it was.
  pub fn open(
    &mut self,
    capacity: usize,
    policy: Policy,
  ) -> Result<PoolHandle> {
    let initialized_here = !self.is_initialized();
    if initialized_here {
      self.init()?;
    }

    let opened = self.open_pool(capacity, policy);
    if opened.is_err() && initialized_here {
      self.pools = None;
    }
    opened
  }

  fn open_pool(
    &mut self,
    capacity: usize,
    policy: Policy,
  ) -> Result<PoolHandle> {
    let pools = self.pools.as_mut().ok_or(PoolError::NotInitialized)?;
    pools.reserve_one()?;

    let handle = PoolHandle::from_raw(self.next_id);
    let pool = Pool::open(handle, capacity, policy, &self.config, &mut self.backing)?;
    pools.push(pool)?;
    self.next_id += 1;

    debug!(
      pool = %handle,
      capacity,
      %policy,
      open = pools.len(),
      "opened pool"
    );
    Ok(handle)
  }

  /// Closes an idle pool and returns its arena to the backing allocator.
  pub fn close(
    &mut self,
    handle: PoolHandle,
  ) -> Result<()> {
    let pools = self.pools.as_mut().ok_or(PoolError::NotFound(handle))?;
    let position = pools
      .iter()
      .position(|pool| pool.handle() == handle)
      .ok_or(PoolError::NotFound(handle))?;

    let live = pools[position].num_allocs();
    if live > 0 {
      return Err(PoolError::PoolBusy { live });
    }

    let pool = pools.swap_remove(position);
    self.backing.release(pool.into_buffer());

    debug!(pool = %handle, open = pools.len(), "closed pool");
    Ok(())
  }

  pub fn pool(
    &self,
    handle: PoolHandle,
  ) -> Result<&Pool> {
    self
      .pools
      .as_ref()
      .and_then(|pools| pools.iter().find(|pool| pool.handle() == handle))
      .ok_or(PoolError::NotFound(handle))
  }

  pub fn pool_mut(
    &mut self,
    handle: PoolHandle,
  ) -> Result<&mut Pool> {
    self
      .pools
      .as_mut()
      .and_then(|pools| pools.iter_mut().find(|pool| pool.handle() == handle))
      .ok_or(PoolError::NotFound(handle))
  }

  /// Open pools, in registry order.
  pub fn pools(&self) -> impl Iterator<Item = &Pool> {
    self.pools.iter().flat_map(|pools| pools.iter())
  }

  pub fn allocate(
    &mut self,
    pool: PoolHandle,
    size: usize,
  ) -> Result<AllocHandle> {
    self.pool_mut(pool)?.allocate(size)
  }

  pub fn deallocate(
    &mut self,
    pool: PoolHandle,
    alloc: AllocHandle,
  ) -> Result<()> {
    self.pool_mut(pool)?.deallocate(alloc)
  }

  pub fn inspect(
    &self,
    pool: PoolHandle,
  ) -> Result<Vec<Segment>> {
    Ok(self.pool(pool)?.inspect())
  }
}

impl<B: BackingAllocator> Drop for Registry<B> {
  fn drop(&mut self) {
    if self.pools.is_some() {
      let _ = self.teardown();
    }
  }
}
