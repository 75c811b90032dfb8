use rallocator::{Config, Policy, PoolError, Registry};

/// Leaves gaps of 30 @ 0, 20 @ 40 and 30 @ 70 in a 100-byte pool.
fn fragmented(policy: Policy) -> (Registry, rallocator::PoolHandle) {
  let mut registry = Registry::new();
  let pool = registry.open(100, policy).unwrap();

  let a = registry.allocate(pool, 30).unwrap();
  registry.allocate(pool, 10).unwrap();
  let c = registry.allocate(pool, 20).unwrap();
  registry.allocate(pool, 10).unwrap();
  registry.deallocate(pool, a).unwrap();
  registry.deallocate(pool, c).unwrap();

  let gaps: Vec<(usize, usize)> = registry
    .inspect(pool)
    .unwrap()
    .into_iter()
    .filter(|segment| !segment.allocated)
    .map(|segment| (segment.offset, segment.size))
    .collect();
  assert_eq!(gaps, vec![(0, 30), (40, 20), (70, 30)]);

  (registry, pool)
}

#[test]
fn test_first_fit_scans_address_order() {
  let (mut registry, pool) = fragmented(Policy::FirstFit);

  let alloc = registry.allocate(pool, 15).unwrap();
  assert_eq!(registry.pool(pool).unwrap().offset(alloc), Ok(0));
}

#[test]
fn test_best_fit_picks_smallest_gap() {
  let (mut registry, pool) = fragmented(Policy::BestFit);

  let alloc = registry.allocate(pool, 15).unwrap();
  assert_eq!(registry.pool(pool).unwrap().offset(alloc), Ok(40));
}

#[test]
fn test_best_fit_ties_go_to_lowest_address() {
  let (mut registry, pool) = fragmented(Policy::BestFit);

  // Both 30-byte gaps fit; the one at offset 0 wins.
  let alloc = registry.allocate(pool, 25).unwrap();
  assert_eq!(registry.pool(pool).unwrap().offset(alloc), Ok(0));
}

#[test]
fn test_adjacent_frees_merge_in_either_order() {
  for reversed in [false, true] {
    let mut registry = Registry::new();
    let pool = registry.open(64, Policy::FirstFit).unwrap();
    let fence = registry.allocate(pool, 8).unwrap();
    let a = registry.allocate(pool, 16).unwrap();
    let b = registry.allocate(pool, 16).unwrap();
    registry.allocate(pool, 24).unwrap();

    let (first, second) = if reversed { (b, a) } else { (a, b) };
    registry.deallocate(pool, first).unwrap();
    registry.deallocate(pool, second).unwrap();

    let segments = registry.inspect(pool).unwrap();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[1].offset, 8);
    assert_eq!(segments[1].size, 32);
    assert!(!segments[1].allocated);
    assert_eq!(registry.pool(pool).unwrap().num_gaps(), 1);

    registry.deallocate(pool, fence).unwrap();
    assert_eq!(registry.pool(pool).unwrap().num_gaps(), 1);
  }
}

#[test]
fn test_stale_handle_after_merge() {
  let mut registry = Registry::new();
  let pool = registry.open(64, Policy::BestFit).unwrap();
  let a = registry.allocate(pool, 16).unwrap();
  let b = registry.allocate(pool, 16).unwrap();

  registry.deallocate(pool, a).unwrap();
  // `b` merges into `a`'s gap and its slot is recycled.
  registry.deallocate(pool, b).unwrap();
  let c = registry.allocate(pool, 16).unwrap();
  let d = registry.allocate(pool, 16).unwrap();

  let before = registry.inspect(pool).unwrap();
  assert_eq!(registry.deallocate(pool, a), Err(PoolError::InvalidHandle));
  assert_eq!(registry.deallocate(pool, b), Err(PoolError::InvalidHandle));
  assert_eq!(registry.inspect(pool).unwrap(), before);

  registry.deallocate(pool, c).unwrap();
  registry.deallocate(pool, d).unwrap();
}

#[test]
fn test_handle_from_other_pool_rejected() {
  let mut registry = Registry::new();
  let first = registry.open(32, Policy::BestFit).unwrap();
  let second = registry.open(32, Policy::BestFit).unwrap();

  let alloc = registry.allocate(first, 8).unwrap();
  assert_eq!(alloc.pool(), first);
  assert_eq!(registry.deallocate(second, alloc), Err(PoolError::InvalidHandle));
  assert_eq!(registry.pool(first).unwrap().num_allocs(), 1);
}

#[test]
fn test_node_table_limit_is_atomic() {
  let mut registry = Registry::with_config(Config::bounded(3));
  let pool = registry.open(100, Policy::FirstFit).unwrap();
  registry.allocate(pool, 10).unwrap();
  registry.allocate(pool, 10).unwrap();

  let before = registry.inspect(pool).unwrap();
  assert!(matches!(
    registry.allocate(pool, 10),
    Err(PoolError::OutOfMemory { .. })
  ));
  assert_eq!(registry.inspect(pool).unwrap(), before);
  assert_eq!(registry.pool(pool).unwrap().check_invariants(), Ok(()));

  // An exact fit needs no new descriptor.
  registry.allocate(pool, 80).unwrap();
  assert_eq!(registry.pool(pool).unwrap().num_gaps(), 0);
}

#[test]
fn test_tables_grow_past_initial_capacity() {
  let mut registry = Registry::with_config(Config::compact());
  let pool = registry.open(1000, Policy::FirstFit).unwrap();

  let allocs: Vec<_> = (0..100)
    .map(|_| registry.allocate(pool, 10).unwrap())
    .collect();
  // Free every other block so the gap index fills up too.
  for alloc in allocs.iter().step_by(2) {
    registry.deallocate(pool, *alloc).unwrap();
  }

  let stats = registry.pool(pool).unwrap().stats();
  assert_eq!(stats.num_gaps, 50);
  assert!(stats.node_capacity >= 100);
  assert!(stats.gap_capacity >= 50);
  assert_eq!(registry.pool(pool).unwrap().check_invariants(), Ok(()));
}
