use crate::archive::{ArchiveProducer, ARCHIVE_SUFFIX};
use crate::backup::catalog::BackupCatalog;
use crate::backup::error::{BackupError, BackupResult};
use crate::backup::types::{BackupNaming, BackupRecord};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Largest same-second suffix that keeps names fixed-width
const MAX_SAME_SECOND_SUFFIX: u32 = 999_999;

/// Keeps a backup collection at no more than `limit` archives by evicting
/// the oldest before each new backup is written.
///
/// Eviction and creation are two separate steps with no lock between them:
/// two concurrent rotations of the same collection can both pass the count
/// check and leave `limit + 1` backups behind until the next rotation.
#[derive(Debug, Clone, Default)]
pub struct BackupRotator {
    producer: ArchiveProducer,
    naming: BackupNaming,
}

impl BackupRotator {
    pub fn new(producer: ArchiveProducer, naming: BackupNaming) -> Self {
        Self { producer, naming }
    }

    pub fn naming(&self) -> BackupNaming {
        self.naming
    }

    /// Rotate `collection` and archive `source` into it, stamped with the
    /// current UTC time. Blocking.
    pub fn rotate_and_create(
        &self,
        source: &Path,
        collection: &Path,
        limit: usize,
    ) -> BackupResult<BackupRecord> {
        self.rotate_and_create_at(source, collection, limit, Utc::now())
    }

    pub fn rotate_and_create_at(
        &self,
        source: &Path,
        collection: &Path,
        limit: usize,
        now: DateTime<Utc>,
    ) -> BackupResult<BackupRecord> {
        if limit == 0 {
            return Err(BackupError::InvalidLimit(limit));
        }

        std::fs::create_dir_all(collection)?;
        let filename = self.available_name(collection, now)?;
        let evicted = Self::evict_oldest(collection, limit)?;

        let path = collection.join(&filename);
        let summary = self.producer.write_to_file(source, &path)?;

        crate::metrics::record_backup_created(summary.bytes);
        tracing::info!(
            backup = %path.display(),
            entries = summary.entries,
            bytes = summary.bytes,
            evicted = evicted.len(),
            "backup created"
        );

        Ok(BackupRecord {
            path,
            filename,
            evicted,
            summary,
        })
    }

    /// Run [`BackupRotator::rotate_and_create`] on the blocking pool
    pub async fn rotate_and_create_async(
        &self,
        source: PathBuf,
        collection: PathBuf,
        limit: usize,
    ) -> BackupResult<BackupRecord> {
        let rotator = self.clone();
        tokio::task::spawn_blocking(move || rotator.rotate_and_create(&source, &collection, limit))
            .await
            .map_err(|e| BackupError::TaskFailed(e.to_string()))?
    }

    /// Timestamp name for `now`. If backups from the same second exist, the
    /// name gets a fixed-width `_NNNNNN` suffix one past the highest present,
    /// so it sorts after all of them even once the bare name has been
    /// evicted.
    fn available_name(&self, collection: &Path, now: DateTime<Utc>) -> BackupResult<String> {
        let base = self.naming.file_name(now);
        let stem = base.trim_end_matches(ARCHIVE_SUFFIX);

        let highest = BackupCatalog::list(collection)?
            .iter()
            .filter_map(|name| {
                let rest = name.strip_prefix(stem)?.strip_suffix(ARCHIVE_SUFFIX)?;
                match rest.strip_prefix('_') {
                    None if rest.is_empty() => Some(0),
                    Some(n) => n.parse::<u32>().ok(),
                    None => None,
                }
            })
            .max();

        match highest {
            None => Ok(base),
            Some(n) if n >= MAX_SAME_SECOND_SUFFIX => Err(BackupError::NamesExhausted(base)),
            Some(n) => Ok(format!("{stem}_{:06}{ARCHIVE_SUFFIX}", n + 1)),
        }
    }

    /// Make room for one more backup. Removal failures are logged and
    /// skipped; returns the names actually removed.
    fn evict_oldest(collection: &Path, limit: usize) -> BackupResult<Vec<String>> {
        let existing = BackupCatalog::list(collection)?;
        if existing.len() < limit {
            return Ok(Vec::new());
        }

        let excess = existing.len() - limit + 1;
        let mut evicted = Vec::with_capacity(excess);

        for name in existing.into_iter().take(excess) {
            let path = collection.join(&name);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(backup = %path.display(), "evicted old backup");
                    evicted.push(name);
                }
                Err(e) => {
                    tracing::warn!(backup = %path.display(), error = %e, "failed to evict old backup");
                }
            }
        }

        crate::metrics::record_backups_evicted(evicted.len());
        Ok(evicted)
    }
}
