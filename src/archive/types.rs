/// File suffix of every stored archive
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Size of every streamed chunk except the last
    pub chunk_size: usize,
    /// gzip level, 0-9
    pub compression_level: u32,
    /// Chunks the producer may run ahead of the consumer
    pub channel_capacity: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            channel_capacity: 1,
        }
    }
}

impl ArchiveOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Files written into the archive
    pub entries: u64,
    /// Entries dropped because they could not be read
    pub skipped: u64,
    pub skipped_symlinks: u64,
    /// Compressed size
    pub bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: u64,
    pub directories: u64,
    /// Links, special files and entries pointing outside the destination
    pub skipped: u64,
}
