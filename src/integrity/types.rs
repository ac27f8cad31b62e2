use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root-relative path -> hex content digest
pub type FileHashMap = HashMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumType {
    #[default]
    Blake3,
    Sha256,
    /// What existing desktop clients send
    Md5,
}

impl ChecksumType {
    /// Length of the hex-encoded digest
    pub fn hex_len(&self) -> usize {
        match self {
            ChecksumType::Blake3 | ChecksumType::Sha256 => 64,
            ChecksumType::Md5 => 32,
        }
    }
}
