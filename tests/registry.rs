use std::{cell::Cell, rc::Rc};

use rallocator::{
  BackingAllocator, Config, LibcBacking, Policy, PoolError, PoolHandle, RawBuffer, Registry,
};

/// Counts arena traffic and can be told to refuse the next request.
#[derive(Default, Clone)]
struct TrackingBacking {
  acquired: Rc<Cell<usize>>,
  released: Rc<Cell<usize>>,
  refuse: Rc<Cell<bool>>,
}

impl BackingAllocator for TrackingBacking {
  fn acquire(
    &mut self,
    bytes: usize,
  ) -> rallocator::Result<RawBuffer> {
    if self.refuse.replace(false) {
      return Err(PoolError::OutOfMemory { requested: bytes });
    }
    let buffer = LibcBacking.acquire(bytes)?;
    self.acquired.set(self.acquired.get() + 1);
    Ok(buffer)
  }

  fn release(
    &mut self,
    buffer: RawBuffer,
  ) {
    self.released.set(self.released.get() + 1);
    LibcBacking.release(buffer);
  }
}

/// Hands out buffers half the requested size.
#[derive(Default)]
struct ShortBacking {
  released: usize,
}

impl BackingAllocator for ShortBacking {
  fn acquire(
    &mut self,
    bytes: usize,
  ) -> rallocator::Result<RawBuffer> {
    LibcBacking.acquire(bytes / 2)
  }

  fn release(
    &mut self,
    buffer: RawBuffer,
  ) {
    self.released += 1;
    LibcBacking.release(buffer);
  }
}

fn tracked(config: Config) -> (Registry<TrackingBacking>, TrackingBacking) {
  let backing = TrackingBacking::default();
  (Registry::with_backing(backing.clone(), config), backing)
}

#[test]
fn test_open_failure_leaves_registry_unchanged() {
  let (mut registry, backing) = tracked(Config::default());
  registry.init().unwrap();
  let existing = registry.open(64, Policy::BestFit).unwrap();

  backing.refuse.set(true);
  assert_eq!(
    registry.open(1 << 20, Policy::FirstFit),
    Err(PoolError::OutOfMemory { requested: 1 << 20 })
  );

  assert_eq!(registry.len(), 1);
  assert!(registry.pool(existing).is_ok());
  assert_eq!(backing.acquired.get(), 1);

  // The next open gets a fresh handle and works normally.
  let next = registry.open(64, Policy::FirstFit).unwrap();
  assert_ne!(next, existing);
}

#[test]
fn test_short_buffer_from_backing_is_rejected() {
  let mut registry = Registry::with_backing(ShortBacking::default(), Config::default());

  assert_eq!(
    registry.open(100, Policy::BestFit),
    Err(PoolError::OutOfMemory { requested: 100 })
  );
  assert_eq!(registry.backing().released, 1);
  assert!(!registry.is_initialized());
  assert_eq!(registry.pools().count(), 0);
}

#[test]
fn test_implicit_init_rolled_back_on_failure() {
  let (mut registry, backing) = tracked(Config::default());
  backing.refuse.set(true);

  assert!(registry.open(64, Policy::BestFit).is_err());
  assert!(!registry.is_initialized());
  assert_eq!(registry.teardown(), Err(PoolError::NotInitialized));
}

#[test]
fn test_close_busy_pool_is_refused() {
  let (mut registry, backing) = tracked(Config::default());
  let pool = registry.open(128, Policy::BestFit).unwrap();
  let a = registry.allocate(pool, 32).unwrap();
  let b = registry.allocate(pool, 32).unwrap();

  assert_eq!(registry.close(pool), Err(PoolError::PoolBusy { live: 2 }));
  registry.deallocate(pool, a).unwrap();
  assert_eq!(registry.close(pool), Err(PoolError::PoolBusy { live: 1 }));
  assert_eq!(backing.released.get(), 0);

  // Still fully usable after a refused close.
  assert_eq!(registry.pool(pool).unwrap().check_invariants(), Ok(()));
  registry.deallocate(pool, b).unwrap();

  registry.close(pool).unwrap();
  assert_eq!(backing.released.get(), 1);
  assert_eq!(registry.close(pool), Err(PoolError::NotFound(pool)));
}

#[test]
fn test_close_unknown_pool() {
  let mut registry = Registry::new();
  let ghost = PoolHandle::from_raw(42);

  assert_eq!(registry.close(ghost), Err(PoolError::NotFound(ghost)));
  registry.init().unwrap();
  assert_eq!(registry.close(ghost), Err(PoolError::NotFound(ghost)));
  assert_eq!(registry.allocate(ghost, 1), Err(PoolError::NotFound(ghost)));
}

#[test]
fn test_teardown_releases_busy_pools() {
  let (mut registry, backing) = tracked(Config::default());
  let idle = registry.open(64, Policy::BestFit).unwrap();
  let busy = registry.open(64, Policy::FirstFit).unwrap();
  registry.allocate(busy, 16).unwrap();

  registry.teardown().unwrap();

  assert_eq!(backing.acquired.get(), 2);
  assert_eq!(backing.released.get(), 2);
  assert!(!registry.is_initialized());
  assert_eq!(registry.pool(idle).err(), Some(PoolError::NotFound(idle)));

  // Registries can be reused after teardown.
  registry.init().unwrap();
  assert!(registry.is_empty());
}

#[test]
fn test_drop_releases_everything() {
  let (mut registry, backing) = tracked(Config::default());
  for _ in 0..3 {
    let pool = registry.open(32, Policy::BestFit).unwrap();
    registry.allocate(pool, 8).unwrap();
  }

  assert_eq!(registry.backing().acquired.get(), 3);
  drop(registry);
  assert_eq!(backing.released.get(), 3);
}

#[test]
fn test_registry_grows_past_initial_capacity() {
  let (mut registry, backing) = tracked(Config::default());

  let pools: Vec<PoolHandle> = (0..50)
    .map(|_| registry.open(16, Policy::BestFit).unwrap())
    .collect();
  assert_eq!(registry.len(), 50);

  for pool in pools.iter().rev().step_by(3) {
    registry.close(*pool).unwrap();
  }
  assert_eq!(registry.len(), 33);
  assert_eq!(backing.released.get(), 17);

  for pool in registry.pools() {
    assert_eq!(pool.capacity(), 16);
  }
}

#[test]
fn test_registry_limit() {
  let mut registry = Registry::with_config(Config::bounded(2));
  assert_eq!(registry.config().table_limit, Some(2));
  registry.open(16, Policy::BestFit).unwrap();
  registry.open(16, Policy::BestFit).unwrap();

  assert!(matches!(
    registry.open(16, Policy::BestFit),
    Err(PoolError::OutOfMemory { .. })
  ));
  assert_eq!(registry.len(), 2);
}

#[test]
fn test_independent_registries() {
  let mut left = Registry::new();
  let mut right = Registry::new();

  let a = left.open(32, Policy::BestFit).unwrap();
  let b = right.open(64, Policy::FirstFit).unwrap();

  left.allocate(a, 32).unwrap();
  assert_eq!(right.pool(b).unwrap().num_allocs(), 0);
  assert_eq!(right.pool(b).unwrap().capacity(), 64);
}

#[test]
fn test_zero_sizes_rejected() {
  let mut registry = Registry::new();
  assert_eq!(registry.open(0, Policy::BestFit), Err(PoolError::ZeroSize));

  let pool = registry.open(8, Policy::BestFit).unwrap();
  assert_eq!(registry.allocate(pool, 0), Err(PoolError::ZeroSize));
}
