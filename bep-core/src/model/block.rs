/// The nominal size of every block except possibly the last one in a file.
pub const BLOCK_SIZE: u32 = 131_072;

/// A 128 KiB slice of a file, identified by the SHA-256 of its contents.
///
/// `offset` is never sent on the wire; it is derived from a block's position
/// within `FileInfo::blocks` and filled in by [`BlockInfo::with_offsets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub size: u32,
    pub hash: Vec<u8>,
    pub offset: u64,
}

impl BlockInfo {
    pub fn new(size: u32, hash: Vec<u8>) -> Self {
        Self { size, hash, offset: 0 }
    }

    /// Recomputes `offset` for every block in `blocks` from its position,
    /// matching the invariant that every block but the last is exactly
    /// [`BLOCK_SIZE`] bytes.
    pub fn with_offsets(blocks: &mut [BlockInfo]) {
        let mut offset = 0u64;
        for block in blocks.iter_mut() {
            block.offset = offset;
            offset += block.size as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accumulate_from_sizes() {
        let mut blocks = vec![
            BlockInfo::new(BLOCK_SIZE, vec![1]),
            BlockInfo::new(BLOCK_SIZE, vec![2]),
            BlockInfo::new(68_928, vec![3]),
        ];
        BlockInfo::with_offsets(&mut blocks);
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[1].offset, BLOCK_SIZE as u64);
        assert_eq!(blocks[2].offset, (BLOCK_SIZE * 2) as u64);
    }
}
