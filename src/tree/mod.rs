//! Filesystem layout and traversal shared by hashing and archiving.

pub mod error;
pub mod paths;
pub mod walker;

pub use error::{TreeError, TreeResult};
pub use paths::{normalize_key, relative_key, validate_name, StorageLayout};
pub use walker::{TreeEntry, TreeWalker};
