//! Compressed tar archives of save trees
//!
//! - [`ArchiveProducer`] builds `.tar.gz` archives either as a chunked stream
//!   (a blocking producer thread feeding a bounded channel) or into a file.
//! - [`ArchiveExtractor`] unpacks an archive additively into a directory.

pub mod error;
pub mod extractor;
pub mod producer;
pub mod types;
mod writer;

pub use error::{ArchiveError, ArchiveResult};
pub use extractor::ArchiveExtractor;
pub use producer::{ArchiveProducer, ArchiveStream};
pub use types::{
    ArchiveOptions, ArchiveSummary, ExtractSummary, ARCHIVE_SUFFIX, DEFAULT_CHUNK_SIZE,
    DEFAULT_COMPRESSION_LEVEL,
};
