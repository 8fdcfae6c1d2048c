//! Transfer units and chunk sizing

use std::path::PathBuf;

use super::newtypes::RemoteId;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Files strictly larger than this use 10 MiB chunks
pub const LARGE_FILE_THRESHOLD: u64 = 100 * MIB;
/// Files strictly larger than this (and up to the large threshold) use 5 MiB chunks
pub const MEDIUM_FILE_THRESHOLD: u64 = 10 * MIB;
/// Files strictly smaller than this use 256 KiB chunks
pub const SMALL_FILE_THRESHOLD: u64 = MIB;

/// Chunk size used to upload a file of `size` bytes
///
/// | size                  | chunk   |
/// |-----------------------|---------|
/// | > 100 MiB             | 10 MiB  |
/// | > 10 MiB, <= 100 MiB  | 5 MiB   |
/// | < 1 MiB               | 256 KiB |
/// | otherwise             | 1 MiB   |
#[must_use]
pub fn chunk_size_for(size: u64) -> u64 {
    if size > LARGE_FILE_THRESHOLD {
        10 * MIB
    } else if size > MEDIUM_FILE_THRESHOLD {
        5 * MIB
    } else if size < SMALL_FILE_THRESHOLD {
        256 * KIB
    } else {
        MIB
    }
}

/// A single file scheduled for upload into a resolved remote folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferUnit {
    /// Absolute local path of the file
    pub local_path: PathBuf,
    /// Path relative to the subtree root, for reporting
    pub relative_path: PathBuf,
    /// File name as it will appear remotely
    pub name: String,
    /// Size in bytes at scheduling time
    pub size: u64,
    /// Remote folder the file goes into
    pub parent_id: RemoteId,
    /// Bytes per chunk, derived from `size`
    pub chunk_size: u64,
}

impl TransferUnit {
    pub fn new(
        local_path: PathBuf,
        relative_path: PathBuf,
        size: u64,
        parent_id: RemoteId,
    ) -> Self {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            local_path,
            relative_path,
            name,
            size,
            parent_id,
            chunk_size: chunk_size_for(size),
        }
    }

    /// Number of chunks needed; an empty file still takes one (empty) chunk
    #[must_use]
    pub fn chunk_count(&self) -> u64 {
        if self.size == 0 {
            1
        } else {
            self.size.div_ceil(self.chunk_size)
        }
    }
}
