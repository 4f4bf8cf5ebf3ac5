//! Row-block partitioning of the raster extent.

/// A contiguous strip of raster rows processed as one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Block index, 0-based.
    pub index: usize,
    /// First row (inclusive).
    pub row_start: usize,
    /// Last row (exclusive).
    pub row_end: usize,
}

impl Block {
    /// Number of rows in this block.
    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }
}

/// Partition `[0, height)` into blocks of `block_rows` rows; the last
/// block holds the remainder.
pub fn partition_rows(height: usize, block_rows: usize) -> Vec<Block> {
    assert!(block_rows > 0, "block_rows must be positive");
    let mut blocks = Vec::with_capacity(height.div_ceil(block_rows));
    let mut row = 0;
    while row < height {
        let end = (row + block_rows).min(height);
        blocks.push(Block {
            index: blocks.len(),
            row_start: row,
            row_end: end,
        });
        row = end;
    }
    blocks
}
