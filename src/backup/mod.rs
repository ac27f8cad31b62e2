//! Rotated per-(user, game) backups
//!
//! A game's backups live in one directory as `<timestamp>.tar.gz` files.
//! Filename order stands in for creation order, so the naming scheme has to
//! sort chronologically; see [`BackupNaming`].

pub mod catalog;
pub mod error;
pub mod rotator;
pub mod types;

pub use catalog::BackupCatalog;
pub use error::{BackupError, BackupResult};
pub use rotator::BackupRotator;
pub use types::{BackupInfo, BackupNaming, BackupRecord};
