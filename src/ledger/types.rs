use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last successful sync of one game for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub username: String,
    pub game_name: String,
    pub last_sync: DateTime<Utc>,
}

/// Outcome of comparing a client's last-sync date against the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCheck {
    /// No record existed; one was created
    FirstSync,
    /// Client is at least as recent as the server
    Current,
    /// Server has a newer sync than the client knows about
    Stale { server_last_sync: DateTime<Utc> },
}

impl SyncCheck {
    pub fn may_proceed(&self) -> bool {
        !matches!(self, SyncCheck::Stale { .. })
    }
}
