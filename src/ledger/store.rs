use crate::ledger::error::{LedgerError, LedgerResult};
use crate::ledger::types::{LedgerEntry, SyncCheck};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

/// Per (user, game) record of the last successful sync, used to refuse
/// sync requests from clients that have fallen behind the server.
pub struct SyncLedger {
    pool: SqlitePool,
}

impl SyncLedger {
    /// Open (creating if needed) the ledger database at `url`
    pub async fn new(url: &str) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new();
        // Every connection to `:memory:` is its own database
        if url.contains(":memory:") {
            pool_options = pool_options.max_connections(1);
        }
        let pool = pool_options.connect_with(options).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_ledger (
                username TEXT NOT NULL,
                game_name TEXT NOT NULL,
                last_sync INTEGER NOT NULL,
                PRIMARY KEY (username, game_name)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// In-memory ledger (for testing)
    pub async fn new_in_memory() -> LedgerResult<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Compare the client's last-sync date with the stored one.
    ///
    /// With no record, one is created stamped now and the check passes.
    /// The check fails only when the stored date is strictly newer.
    pub async fn check(
        &self,
        username: &str,
        game_name: &str,
        client_date: DateTime<Utc>,
    ) -> LedgerResult<SyncCheck> {
        match self.get(username, game_name).await? {
            None => {
                self.touch(username, game_name).await?;
                Ok(SyncCheck::FirstSync)
            }
            Some(entry) if entry.last_sync > client_date => {
                tracing::debug!(
                    user = username,
                    game = game_name,
                    server = %entry.last_sync,
                    client = %client_date,
                    "client sync date is behind the server"
                );
                Ok(SyncCheck::Stale {
                    server_last_sync: entry.last_sync,
                })
            }
            Some(_) => Ok(SyncCheck::Current),
        }
    }

    /// Stamp the record with the current time
    pub async fn touch(&self, username: &str, game_name: &str) -> LedgerResult<DateTime<Utc>> {
        let now = Utc::now();
        self.touch_at(username, game_name, now).await?;
        Ok(now)
    }

    pub async fn touch_at(
        &self,
        username: &str,
        game_name: &str,
        at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_ledger (username, game_name, last_sync)
            VALUES (?, ?, ?)
            ON CONFLICT(username, game_name) DO UPDATE SET last_sync = excluded.last_sync
            "#,
        )
        .bind(username)
        .bind(game_name)
        .bind(at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, username: &str, game_name: &str) -> LedgerResult<Option<LedgerEntry>> {
        let row = sqlx::query(
            "SELECT last_sync FROM sync_ledger WHERE username = ? AND game_name = ?",
        )
        .bind(username)
        .bind(game_name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let millis: i64 = row.try_get("last_sync")?;
        let last_sync =
            DateTime::from_timestamp_millis(millis).ok_or(LedgerError::InvalidTimestamp(millis))?;

        Ok(Some(LedgerEntry {
            username: username.to_string(),
            game_name: game_name.to_string(),
            last_sync,
        }))
    }

    /// Delete the record; returns whether one existed
    pub async fn remove(&self, username: &str, game_name: &str) -> LedgerResult<bool> {
        let result = sqlx::query("DELETE FROM sync_ledger WHERE username = ? AND game_name = ?")
            .bind(username)
            .bind(game_name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a record to a new game name, replacing any record already there
    pub async fn rename(&self, username: &str, old: &str, new: &str) -> LedgerResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sync_ledger WHERE username = ? AND game_name = ?")
            .bind(username)
            .bind(new)
            .execute(&mut *tx)
            .await?;

        let result =
            sqlx::query("UPDATE sync_ledger SET game_name = ? WHERE username = ? AND game_name = ?")
                .bind(new)
                .bind(username)
                .bind(old)
                .execute(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> LedgerResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM sync_ledger")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("count")?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
