//! Walks a best-fit pool through the classic allocate/free script and prints
//! the block layout after every step.
//!
//! Run with `RUST_LOG=rallocator=trace` to see the split/merge events.

use rallocator::{Policy, Registry};
use tracing_subscriber::EnvFilter;

const MEGABYTE: usize = 1000 * 1000;

fn main() -> rallocator::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut registry = Registry::new();
  registry.init()?;

  let pool = registry.open(100 * MEGABYTE, Policy::BestFit)?;
  println!("{}", registry.pool(pool)?);

  // --------------------------------------------------------------------
  // 1) Ten allocations. Best-fit always carves from the single residual
  //    gap, so they land back to back.
  // --------------------------------------------------------------------
  let mut allocs = Vec::new();
  for size in [10, 12, 2, 30, 4, 1, 12, 9, 3, 1] {
    allocs.push(registry.allocate(pool, size * MEGABYTE)?);
    println!("[alloc {size} MB]\n{}", registry.pool(pool)?);
  }

  // --------------------------------------------------------------------
  // 2) Free in an order that exercises every merge case: isolated,
  //    bridging two gaps, merging upward and downward.
  // --------------------------------------------------------------------
  for index in [5, 7, 6, 4, 3, 2, 1, 0, 9, 8] {
    let size = registry.pool(pool)?.block_size(allocs[index])? / MEGABYTE;
    registry.deallocate(pool, allocs[index])?;
    println!("[free {size} MB]\n{}", registry.pool(pool)?);
  }

  let stats = registry.pool(pool)?.stats();
  println!(
    "gaps = {}, largest = {} bytes, fragmentation = {:.1}%",
    stats.num_gaps,
    stats.largest_gap,
    stats.fragmentation() * 100.0
  );

  registry.close(pool)?;
  registry.teardown()
}
