use super::file::FileInfo;

/// Wire limits from the data model section of the spec.
pub mod limits {
    pub const MAX_FOLDER_ID_BYTES: usize = 64;
    pub const MAX_FILES: usize = 1_000_000;
    pub const MAX_NAME_BYTES: usize = 1024;
    pub const MAX_BLOCKS_PER_FILE: usize = 1_000_000;
    pub const MAX_HASH_BYTES: usize = 64;
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexMessage {
    pub folder_id: String,
    pub files: Vec<FileInfo>,
}

impl IndexMessage {
    /// Validates the size limits from the data model; does not validate
    /// individual `FileInfo` invariants (see [`FileInfo::validate`]).
    pub fn validate(&self) -> Result<(), String> {
        if self.folder_id.len() > limits::MAX_FOLDER_ID_BYTES {
            return Err(format!(
                "folder id is {} bytes, limit is {}",
                self.folder_id.len(),
                limits::MAX_FOLDER_ID_BYTES
            ));
        }
        if self.files.len() > limits::MAX_FILES {
            return Err(format!(
                "index carries {} files, limit is {}",
                self.files.len(),
                limits::MAX_FILES
            ));
        }
        for file in &self.files {
            if file.name.len() > limits::MAX_NAME_BYTES {
                return Err(format!("file name '{}' exceeds byte limit", file.name));
            }
            if file.blocks.len() > limits::MAX_BLOCKS_PER_FILE {
                return Err(format!(
                    "file '{}' carries {} blocks, limit is {}",
                    file.name,
                    file.blocks.len(),
                    limits::MAX_BLOCKS_PER_FILE
                ));
            }
            for block in &file.blocks {
                if block.hash.len() > limits::MAX_HASH_BYTES {
                    return Err(format!("file '{}' has an oversize block hash", file.name));
                }
            }
            file.validate()?;
        }
        Ok(())
    }
}
