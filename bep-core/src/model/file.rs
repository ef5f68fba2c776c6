use super::block::BlockInfo;

/// Bitmasks for [`FileInfo::flags`]. The low 12 bits (`0xFFF`) carry Unix
/// permission bits; the remaining bits are reserved status flags.
pub mod flags {
    /// File is a directory (blocks is always empty).
    pub const DIRECTORY: u32 = 1 << 14;
    /// Permission bits in the low 12 bits are not meaningful.
    pub const NO_PERM_BITS: u32 = 1 << 17;
    /// The file's content is currently invalid/unavailable.
    pub const INVALID: u32 = 1 << 18;
    /// The file has been deleted; `blocks` must be empty.
    pub const DELETED: u32 = 1 << 19;
    /// The file is excluded by ignore patterns.
    pub const IGNORED: u32 = 1 << 20;
    /// The file is a symlink.
    pub const SYMLINK: u32 = 1 << 23;

    pub const PERMISSION_MASK: u32 = 0xFFF;
}

/// Per-file metadata and block list, as exchanged in Index/IndexUpdate
/// messages. `name` is always `/`-separated UTF-8 NFC on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub name: String,
    pub flags: u32,
    pub modified_seconds: i64,
    pub version: u64,
    pub local_version: u64,
    pub blocks: Vec<BlockInfo>,
}

impl FileInfo {
    pub fn is_deleted(&self) -> bool {
        self.flags & flags::DELETED != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & flags::DIRECTORY != 0
    }

    pub fn is_invalid(&self) -> bool {
        self.flags & flags::INVALID != 0
    }

    pub fn permission_bits(&self) -> Option<u32> {
        if self.flags & flags::NO_PERM_BITS != 0 {
            None
        } else {
            Some(self.flags & flags::PERMISSION_MASK)
        }
    }

    /// Concatenation of all block hashes, used as the tie-break key when two
    /// `FileInfo`s share `(version, modified_seconds)`.
    pub fn concatenated_block_hashes(&self) -> Vec<u8> {
        self.blocks.iter().flat_map(|b| b.hash.iter().copied()).collect()
    }

    /// Checks the structural invariants from the data model: deleted files
    /// carry no blocks, and only the final block may be short.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_deleted() && !self.blocks.is_empty() {
            return Err(format!(
                "file '{}' is marked deleted but carries {} blocks",
                self.name,
                self.blocks.len()
            ));
        }
        for (i, block) in self.blocks.iter().enumerate() {
            if block.size > super::block::BLOCK_SIZE {
                return Err(format!(
                    "file '{}' block {i} has size {} exceeding {}",
                    self.name,
                    block.size,
                    super::block::BLOCK_SIZE
                ));
            }
            let is_last = i + 1 == self.blocks.len();
            if !is_last && block.size != super::block::BLOCK_SIZE {
                return Err(format!(
                    "file '{}' block {i} is short ({} bytes) but is not the last block",
                    self.name, block.size
                ));
            }
        }
        Ok(())
    }
}
