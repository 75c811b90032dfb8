//! Per-pool table of block descriptors, doubly linked in address order.
//!
//! Links are slot indices rather than pointers, so growing the backing `Vec`
//! never invalidates them. Reclaimed slots are tombstoned in place and chained
//! on an intrusive vacant list for reuse; live slots never move.

use std::ops::{Index, IndexMut};

use crate::{
  block::{Block, BlockState},
  config::Growth,
  error::Result,
  table::Table,
};

#[derive(Debug, Clone, Copy)]
enum Slot {
  Live { block: Block, generation: u32 },
  Vacant { generation: u32, next_vacant: Option<usize> },
}

#[derive(Debug)]
pub(crate) struct NodeTable {
  slots: Table<Slot>,
  head: Option<usize>,
  tail: Option<usize>,
  vacant: Option<usize>,
  live: usize,
}

impl NodeTable {
  pub(crate) fn new(growth: Growth) -> Result<Self> {
    Ok(Self {
      slots: Table::new(growth)?,
      head: None,
      tail: None,
      vacant: None,
      live: 0,
    })
  }

  /// Number of blocks currently in the address-order list.
  pub(crate) fn len(&self) -> usize {
    self.live
  }

  /// Slots in use or tombstoned, i.e. the high-water mark of the table.
  pub(crate) fn slot_count(&self) -> usize {
    self.slots.len()
  }

  pub(crate) fn capacity(&self) -> usize {
    self.slots.capacity()
  }

  /// Returns the block in `index` together with its generation, if live.
  pub(crate) fn get(
    &self,
    index: usize,
  ) -> Option<(u32, &Block)> {
    match self.slots.get(index)? {
      Slot::Live { block, generation } => Some((*generation, block)),
      Slot::Vacant { .. } => None,
    }
  }

  /// Appends `block` at the high-address end of the list.
  pub(crate) fn append(
    &mut self,
    mut block: Block,
  ) -> Result<usize> {
    block.prev = self.tail;
    block.next = None;

    let index = self.occupy(block)?;
    match self.tail {
      Some(tail) => self[tail].next = Some(index),
      None => self.head = Some(index),
    }
    self.tail = Some(index);

    Ok(index)
  }

  /// Links `block` immediately after `anchor` in address order.
  pub(crate) fn insert_after(
    &mut self,
    anchor: usize,
    mut block: Block,
  ) -> Result<usize> {
    let next = self[anchor].next;
    block.prev = Some(anchor);
    block.next = next;

    let index = self.occupy(block)?;
    self[anchor].next = Some(index);
    match next {
      Some(next) => self[next].prev = Some(index),
      None => self.tail = Some(index),
    }

    Ok(index)
  }

  /// Unlinks the block in `index` and tombstones its slot.
  pub(crate) fn reclaim(
    &mut self,
    index: usize,
  ) {
    let Block { prev, next, .. } = self[index];

    match prev {
      Some(prev) => self[prev].next = next,
      None => self.head = next,
    }
    match next {
      Some(next) => self[next].prev = prev,
      None => self.tail = prev,
    }

    let generation = self.generation(index).wrapping_add(1);
    self.slots[index] = Slot::Vacant {
      generation,
      next_vacant: self.vacant,
    };
    self.vacant = Some(index);
    self.live -= 1;
  }

  /// Changes the state of a live block and returns its new generation.
  pub(crate) fn transition(
    &mut self,
    index: usize,
    state: BlockState,
  ) -> u32 {
    match &mut self.slots[index] {
      Slot::Live { block, generation } => {
        block.state = state;
        *generation = generation.wrapping_add(1);
        *generation
      }
      Slot::Vacant { .. } => vacant(index),
    }
  }

  /// Walks the blocks in ascending address order.
  pub(crate) fn iter(&self) -> Iter<'_> {
    Iter {
      table: self,
      cursor: self.head,
    }
  }

  fn generation(
    &self,
    index: usize,
  ) -> u32 {
    match self.slots[index] {
      Slot::Live { generation, .. } | Slot::Vacant { generation, .. } => generation,
    }
  }

  /// Puts `block` in a recycled slot if one exists, otherwise in a new one.
  fn occupy(
    &mut self,
    block: Block,
  ) -> Result<usize> {
    let index = match self.vacant {
      Some(index) => {
        let Slot::Vacant {
          generation,
          next_vacant,
        } = self.slots[index]
        else {
          unreachable!("vacant list points at live slot {index}");
        };
        self.vacant = next_vacant;
        self.slots[index] = Slot::Live { block, generation };
        index
      }
      None => self.slots.push(Slot::Live {
        block,
        generation: 0,
      })?,
    };

    self.live += 1;
    Ok(index)
  }
}

impl Index<usize> for NodeTable {
  type Output = Block;

  fn index(
    &self,
    index: usize,
  ) -> &Block {
    match &self.slots[index] {
      Slot::Live { block, .. } => block,
      Slot::Vacant { .. } => vacant(index),
    }
  }
}

impl IndexMut<usize> for NodeTable {
  fn index_mut(
    &mut self,
    index: usize,
  ) -> &mut Block {
    match &mut self.slots[index] {
      Slot::Live { block, .. } => block,
      Slot::Vacant { .. } => vacant(index),
    }
  }
}

#[cold]
fn vacant(index: usize) -> ! {
  panic!("node table slot {index} is vacant")
}

pub(crate) struct Iter<'a> {
  table: &'a NodeTable,
  cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
  type Item = (usize, &'a Block);

  fn next(&mut self) -> Option<Self::Item> {
    let index = self.cursor?;
    let table = self.table;
    let block = &table[index];
    self.cursor = block.next;
    Some((index, block))
  }
}
