pub mod error;
pub mod scanner;
pub mod types;

pub use error::{ScanError, ScanResult};
pub use scanner::HashScanner;
pub use types::{ChecksumType, FileHashMap};
