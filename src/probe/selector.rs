use rand::Rng;

/// Picks uniformly random, block-aligned read offsets inside a file.
///
/// Only whole blocks are eligible: a trailing partial block is never read,
/// so `offset + block_size <= file_length` always holds.
#[derive(Debug, Clone, Copy)]
pub struct BlockSelector {
    block_size: u64,
    blocks: u64,
}

impl BlockSelector {
    /// Returns `None` when the file can't hold a single block.
    pub fn new(file_length: u64, block_size: u64) -> Option<Self> {
        if block_size == 0 || file_length < block_size {
            return None;
        }
        Some(Self {
            block_size,
            blocks: file_length / block_size,
        })
    }

    /// Number of whole blocks in the file.
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Draws the next offset. Each call is independent of the previous ones.
    pub fn next_offset<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        rng.gen_range(0..self.blocks) * self.block_size
    }
}
