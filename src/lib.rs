//! # rallocator - A Variable-Size Pool Allocator
//!
//! This crate manages one or more fixed-capacity arenas ("pools") and hands
//! out arbitrary-size blocks from them under a **first-fit** or **best-fit**
//! placement policy. Freed blocks are always coalesced with free neighbours.
//!
//! ## Overview
//!
//! ```text
//!   Pool Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                          POOL ARENA                                  │
//!   │                                                                      │
//!   │   ┌──────┬────────┬──┬──────────────┬────┬────┬──────────────┐       │
//!   │   │  A1  │  gap   │A2│      A3      │gap │ A4 │     gap      │       │
//!   │   └──────┴────────┴──┴──────────────┴────┴────┴──────────────┘       │
//!   │                                                                      │
//!   │   Node Table:  A1 ⇄ gap ⇄ A2 ⇄ A3 ⇄ gap ⇄ A4 ⇄ gap  (address order)  │
//!   │   Gap Index:   [4 KiB, 8 KiB, 14 KiB]             (sorted by size)   │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Two gaps are never neighbours: freeing a block merges it into any free
//!   block directly before or after it.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rallocator
//!   ├── backing     - BackingAllocator trait, libc calloc/free arenas
//!   ├── block       - Block descriptor (internal)
//!   ├── config      - Table sizing and growth
//!   ├── error       - PoolError, InvariantViolation
//!   ├── gap_index   - Size-sorted index of free blocks (internal)
//!   ├── handle      - PoolHandle, AllocHandle
//!   ├── node_table  - Address-ordered block list in a slot arena (internal)
//!   ├── pool        - Allocator engine: split, coalesce, inspect
//!   ├── registry    - Pool lifecycle
//!   └── table       - Growable bookkeeping array (internal)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rallocator::{Policy, Registry};
//!
//! # fn main() -> rallocator::Result<()> {
//! let mut registry = Registry::new();
//! registry.init()?;
//!
//! let pool = registry.open(1024, Policy::BestFit)?;
//! let a = registry.allocate(pool, 100)?;
//! let b = registry.allocate(pool, 200)?;
//!
//! registry.pool_mut(pool)?.bytes_mut(a)?.fill(0x2A);
//!
//! registry.deallocate(pool, a)?;
//! registry.deallocate(pool, b)?;
//!
//! // Everything merged back into a single gap.
//! assert_eq!(registry.inspect(pool)?.len(), 1);
//!
//! registry.close(pool)?;
//! registry.teardown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! Allocating splits the chosen gap. The request takes the low end and the
//! rest stays free:
//!
//! ```text
//!   allocate(30) from a 100-byte gap:
//!
//!   before  ┌────────────────────────────────────────────┐
//!           │                 gap (100)                  │
//!           └────────────────────────────────────────────┘
//!   after   ┌─────────────┬──────────────────────────────┐
//!           │ alloc (30)  │          gap (70)            │
//!           └─────────────┴──────────────────────────────┘
//! ```
//!
//! Deallocating merges with free neighbours on either side:
//!
//! ```text
//!   deallocate(B):
//!
//!   before  ┌──────────┬──────────┬──────────┬──────────┐
//!           │ gap (10) │  B (20)  │ gap (30) │  C (40)  │
//!           └──────────┴──────────┴──────────┴──────────┘
//!   after   ┌────────────────────────────────┬──────────┐
//!           │            gap (60)            │  C (40)  │
//!           └────────────────────────────────┴──────────┘
//! ```
//!
//! ## Placement Policies
//!
//! - **FirstFit** takes the lowest-addressed gap that is large enough.
//! - **BestFit** takes the smallest gap that is large enough. Among equal
//!   sizes the lowest address wins.
//!
//! ## Handles
//!
//! [`AllocHandle`] is a `(slot, generation)` pair. The generation changes
//! every time the slot changes state, so deallocating a stale handle fails
//! with [`PoolError::InvalidHandle`] instead of freeing someone else's block.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: pools and registries are neither `Send` nor
//!   `Sync`
//! - **Fixed capacity**: a pool never grows past the size it was opened with
//! - **No alignment guarantees** beyond what the byte offsets give

mod backing;
mod block;
mod config;
mod error;
mod gap_index;
mod handle;
mod node_table;
mod pool;
mod registry;
mod table;

pub use backing::{BackingAllocator, LibcBacking, RawBuffer};
pub use config::Config;
pub use error::{InvariantViolation, PoolError, Result};
pub use handle::{AllocHandle, PoolHandle};
pub use pool::{Policy, Pool, PoolStats, Segment};
pub use registry::Registry;
