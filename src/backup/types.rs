use crate::archive::{ArchiveSummary, ARCHIVE_SUFFIX};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How backup filenames encode their UTC creation time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackupNaming {
    /// `2025-09-29_09-01-11`: fixed width, sorts chronologically
    #[default]
    Sortable,
    /// `2025-29-09_09:01:11` (year, day, month). Kept for collections
    /// written by older servers; lexicographic order misplaces backups
    /// from different months
    Legacy,
}

impl BackupNaming {
    pub fn pattern(&self) -> &'static str {
        match self {
            BackupNaming::Sortable => "%Y-%m-%d_%H-%M-%S",
            BackupNaming::Legacy => "%Y-%d-%m_%H:%M:%S",
        }
    }

    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        format!("{}{}", at.format(self.pattern()), ARCHIVE_SUFFIX)
    }
}

/// Listing entry for a stored backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub filename: String,
    pub size_bytes: u64,
}

/// Outcome of one rotation + creation cycle
#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub path: PathBuf,
    pub filename: String,
    pub evicted: Vec<String>,
    pub summary: ArchiveSummary,
}
