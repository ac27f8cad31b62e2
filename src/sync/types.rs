use crate::integrity::FileHashMap;
use crate::tree::{normalize_key, TreeError, TreeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a client declares at sync time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub game_name: String,
    pub files_data: FileHashMap,
    #[serde(default)]
    pub last_sync_date: Option<DateTime<Utc>>,
}

impl SyncRequest {
    /// The client's hash map with every key in canonical form, so that it
    /// compares equal to keys produced by a server scan.
    ///
    /// Fails on keys that cannot be canonicalized and on two spellings of
    /// the same key declaring different hashes.
    pub fn canonical_files(&self) -> TreeResult<FileHashMap> {
        let mut files = FileHashMap::with_capacity(self.files_data.len());
        for (key, hash) in &self.files_data {
            let key = normalize_key(key)?;
            if let Some(previous) = files.get(&key) {
                if previous != hash {
                    return Err(TreeError::DuplicateKey(key));
                }
                continue;
            }
            files.insert(key, hash.clone());
        }
        Ok(files)
    }
}

/// Difference between the server tree and the client's declared state.
///
/// The client is ground truth: `missing_on_server` and `mismatched` must be
/// uploaded, `extra_on_server` may be deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub missing_on_server: Vec<String>,
    pub extra_on_server: Vec<String>,
    #[serde(rename = "mismatched_hashes", alias = "mismatched")]
    pub mismatched: Vec<String>,
    pub is_up_to_date: bool,
    pub needs_update: usize,
}

impl SyncReport {
    /// Report for two identical (or both empty) maps
    pub fn up_to_date() -> Self {
        Self {
            is_up_to_date: true,
            ..Default::default()
        }
    }

    pub fn has_extras(&self) -> bool {
        !self.extra_on_server.is_empty()
    }
}
