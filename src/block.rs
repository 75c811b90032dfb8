/// Whether a block is handed out or available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
  Free,
  Allocated,
}

/// A contiguous byte range `[offset, offset + size)` of a pool's buffer.
///
/// `prev` / `next` are node table indices of the address-order neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
  pub offset: usize,
  pub size: usize,
  pub state: BlockState,
  pub prev: Option<usize>,
  pub next: Option<usize>,
}

impl Block {
  pub fn new(
    offset: usize,
    size: usize,
    state: BlockState,
  ) -> Self {
    Self {
      offset,
      size,
      state,
      prev: None,
      next: None,
    }
  }

  pub fn free(
    offset: usize,
    size: usize,
  ) -> Self {
    Self::new(offset, size, BlockState::Free)
  }

  #[inline]
  pub fn end(&self) -> usize {
    self.offset + self.size
  }

  #[inline]
  pub fn is_free(&self) -> bool {
    self.state == BlockState::Free
  }
}
