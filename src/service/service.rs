use crate::archive::{ArchiveExtractor, ArchiveProducer, ArchiveStream, ExtractSummary};
use crate::backup::{BackupCatalog, BackupError, BackupInfo, BackupRotator};
use crate::config::SharedConfig;
use crate::integrity::HashScanner;
use crate::ledger::{SyncCheck, SyncLedger};
use crate::metrics::{record_files_deleted, record_sync, RequestTimer};
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::types::{
    GameDeletion, GameRename, Identity, StagedUpload, SyncOutcome, UploadOutcome,
};
use crate::sync::{Reconciler, SyncRequest};
use crate::tree::{validate_name, StorageLayout, TreeWalker};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Entry point for every save operation a user can request.
///
/// Settings are read from the shared config on each call, so a reload takes
/// effect for the next request. The data root is fixed at construction.
pub struct SaveSyncService {
    layout: StorageLayout,
    config: SharedConfig,
    ledger: Arc<SyncLedger>,
}

impl SaveSyncService {
    pub fn new(config: SharedConfig, ledger: SyncLedger) -> Self {
        let layout = StorageLayout::new(config.snapshot().data_root);
        Self {
            layout,
            config,
            ledger: Arc::new(ledger),
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn ledger(&self) -> &SyncLedger {
        &self.ledger
    }

    /// File name offered to clients downloading a game's saves
    pub fn download_file_name(game: &str) -> String {
        format!("{}-saves.tar.gz", game.replace(' ', "_"))
    }

    // ============== Sync ==============

    /// Reconcile the server copy of a game against the client's hash map.
    ///
    /// Files the client no longer has are deleted from the server before
    /// the report is returned. A client whose last sync predates the
    /// server's gets [`SyncOutcome::PullRequired`] and nothing is touched.
    pub async fn check_files(
        &self,
        identity: &Identity,
        request: SyncRequest,
    ) -> ServiceResult<SyncOutcome> {
        let _timer = RequestTimer::start("check_files");

        let result = self.reconcile_game(identity, request).await;
        match &result {
            Ok(SyncOutcome::Report(_)) => record_sync("report"),
            Ok(SyncOutcome::PullRequired { .. }) => record_sync("pull_required"),
            Err(_) => record_sync("error"),
        }
        result
    }

    async fn reconcile_game(
        &self,
        identity: &Identity,
        request: SyncRequest,
    ) -> ServiceResult<SyncOutcome> {
        let user = identity.username();
        let game = request.game_name.as_str();
        validate_name("game", game)?;
        let client_files = request.canonical_files()?;

        if let Some(client_date) = request.last_sync_date {
            if let SyncCheck::Stale { server_last_sync } =
                self.ledger.check(user, game, client_date).await?
            {
                tracing::info!(user, game, %server_last_sync, "client must pull before syncing");
                return Ok(SyncOutcome::PullRequired { server_last_sync });
            }
        }

        let saves = self.layout.game_saves(user, game);
        tokio::fs::create_dir_all(self.layout.game_resources(user, game)).await?;

        let scanner = HashScanner::new(self.config.snapshot().checksum);
        let server = scanner.scan_async(saves.clone()).await?;
        let report = Reconciler::reconcile(&server, &client_files);

        if report.has_extras() {
            let deleted = delete_extras(saves, report.extra_on_server.clone()).await?;
            record_files_deleted(deleted);
        }

        self.ledger.touch(user, game).await?;

        tracing::info!(
            user,
            game,
            missing = report.missing_on_server.len(),
            extra = report.extra_on_server.len(),
            mismatched = report.mismatched.len(),
            "sync check complete"
        );
        Ok(SyncOutcome::Report(report))
    }

    // ============== Transfer ==============

    /// Stage an uploaded archive, unpack it over the game's saves and take
    /// a backup of the result.
    pub async fn receive_upload<S, E>(
        &self,
        identity: &Identity,
        game: &str,
        body: S,
    ) -> ServiceResult<UploadOutcome>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        validate_name("game", game)?;
        let staged = self.stage_upload(identity, body).await?;
        self.apply_upload(identity, game, staged).await
    }

    /// Write an upload body to `tmp_data/<user>` without knowing its game
    /// yet. The staged file is removed when the returned handle is dropped.
    pub async fn stage_upload<S, E>(
        &self,
        identity: &Identity,
        body: S,
    ) -> ServiceResult<StagedUpload>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let staging = self.layout.staging(identity.username());
        tokio::fs::create_dir_all(&staging).await?;

        let mut staged =
            StagedUpload::new(staging.join(format!("upload-{}.tar.gz", uuid::Uuid::new_v4())));
        staged.bytes = write_body(staged.path(), body).await?;

        if staged.bytes == 0 {
            return Err(ServiceError::InvalidRequest("uploaded archive is empty".to_string()));
        }
        tracing::debug!(
            user = %identity,
            bytes = staged.bytes,
            staged = %staged.path().display(),
            "upload staged"
        );
        Ok(staged)
    }

    /// Unpack a staged upload over the game's saves, then rotate its backups
    pub async fn apply_upload(
        &self,
        identity: &Identity,
        game: &str,
        staged: StagedUpload,
    ) -> ServiceResult<UploadOutcome> {
        let _timer = RequestTimer::start("receive_upload");
        validate_name("game", game)?;
        let user = identity.username();
        let saves = self.layout.game_saves(user, game);

        let extracted =
            ArchiveExtractor::extract_async(staged.path().to_path_buf(), saves.clone()).await;
        drop(staged);
        let extracted = extracted?;

        let settings = self.config.snapshot();
        let rotator = BackupRotator::new(
            ArchiveProducer::new(settings.archive_options()),
            settings.backup_naming,
        );
        let record = rotator
            .rotate_and_create_async(
                saves,
                self.layout.game_backups(user, game),
                settings.backups_limit,
            )
            .await?;

        tracing::info!(
            user,
            game,
            files = extracted.files,
            backup = %record.filename,
            "upload applied"
        );
        Ok(UploadOutcome {
            game_name: game.to_string(),
            files_extracted: extracted.files,
            backup: record.filename,
            evicted_backups: record.evicted,
        })
    }

    /// Stream the game's saves as a `.tar.gz`. Absent and empty trees are
    /// both reported as not found.
    pub async fn download(&self, identity: &Identity, game: &str) -> ServiceResult<ArchiveStream> {
        validate_name("game", game)?;
        let saves = self.layout.game_saves(identity.username(), game);

        let dir = saves.clone();
        let has_content = run_blocking(move || match std::fs::read_dir(&dir) {
            Ok(mut entries) => Ok(entries.next().is_some()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await?;

        if !has_content {
            return Err(ServiceError::GameNotFound(game.to_string()));
        }

        let producer = ArchiveProducer::new(self.config.snapshot().archive_options());
        tracing::info!(user = %identity, game, "streaming saves");
        Ok(producer.stream(saves)?)
    }

    // ============== Backups ==============

    /// Every game's backups, keyed by game name
    pub async fn list_backups(
        &self,
        identity: &Identity,
    ) -> ServiceResult<BTreeMap<String, Vec<BackupInfo>>> {
        let root = self.layout.user_backups(identity.username());
        run_blocking(move || Ok(BackupCatalog::describe_all(&root)?)).await
    }

    /// Replace the game's saves with the contents of one of its backups
    pub async fn restore_backup(
        &self,
        identity: &Identity,
        game: &str,
        backup_name: &str,
    ) -> ServiceResult<ExtractSummary> {
        let _timer = RequestTimer::start("restore_backup");
        validate_name("game", game)?;
        let user = identity.username();

        let archive = self.locate_backup(user, game, backup_name)?;
        let saves = self.layout.game_saves(user, game);

        let summary = run_blocking(move || {
            match std::fs::remove_dir_all(&saves) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            Ok(ArchiveExtractor::extract(&archive, &saves)?)
        })
        .await?;

        tracing::info!(user, game, backup = backup_name, files = summary.files, "backup restored");
        Ok(summary)
    }

    pub async fn delete_backup(
        &self,
        identity: &Identity,
        game: &str,
        backup_name: &str,
    ) -> ServiceResult<()> {
        validate_name("game", game)?;
        let user = identity.username();
        let archive = self.locate_backup(user, game, backup_name)?;

        run_blocking(move || Ok(std::fs::remove_file(&archive)?)).await?;
        tracing::info!(user, game, backup = backup_name, "backup deleted");
        Ok(())
    }

    fn locate_backup(&self, user: &str, game: &str, backup_name: &str) -> ServiceResult<PathBuf> {
        BackupCatalog::locate(&self.layout.game_backups(user, game), backup_name).map_err(|e| {
            match e {
                BackupError::NotFound(_) => ServiceError::BackupNotFound {
                    game: game.to_string(),
                    backup: backup_name.to_string(),
                },
                other => other.into(),
            }
        })
    }

    // ============== Games ==============

    /// Names of the user's games, sorted
    pub async fn list_games(&self, identity: &Identity) -> ServiceResult<Vec<String>> {
        let root = self.layout.user_saves(identity.username());
        run_blocking(move || {
            let entries = match std::fs::read_dir(&root) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };

            let mut games = Vec::new();
            for entry in entries {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    games.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            games.sort();
            Ok(games)
        })
        .await
    }

    /// Remove a game's saves; with `delete_backups`, also its backups,
    /// resources and sync record.
    pub async fn delete_game(
        &self,
        identity: &Identity,
        game: &str,
        delete_backups: bool,
    ) -> ServiceResult<GameDeletion> {
        validate_name("game", game)?;
        let user = identity.username();

        let saves = self.layout.game_saves(user, game);
        let backups = self.layout.game_backups(user, game);
        let resources = self.layout.game_resources(user, game);
        let missing = game.to_string();

        run_blocking(move || {
            std::fs::remove_dir_all(&saves).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ServiceError::GameNotFound(missing),
                _ => e.into(),
            })?;

            if delete_backups {
                remove_dir_if_present(&backups)?;
                remove_dir_if_present(&resources)?;
            }
            Ok(())
        })
        .await?;

        if delete_backups {
            self.ledger.remove(user, game).await?;
        }

        tracing::info!(user, game, delete_backups, "game deleted");
        Ok(GameDeletion {
            game_name: game.to_string(),
            backups_deleted: delete_backups,
        })
    }

    /// Rename a game across saves, backups and resources.
    ///
    /// Saves and backups of `old` must exist and no directory of `new` may.
    /// If a move fails, directories already moved are moved back.
    pub async fn rename_game(
        &self,
        identity: &Identity,
        old: &str,
        new: &str,
    ) -> ServiceResult<GameRename> {
        validate_name("game", old)?;
        validate_name("game", new)?;
        let user = identity.username();

        let root = self.layout.root().to_path_buf();
        let moves = vec![
            (
                self.layout.game_saves(user, old),
                self.layout.game_saves(user, new),
                true,
            ),
            (
                self.layout.game_backups(user, old),
                self.layout.game_backups(user, new),
                true,
            ),
            (
                self.layout.game_resources(user, old),
                self.layout.game_resources(user, new),
                false,
            ),
        ];
        let old_name = old.to_string();

        let renamed = run_blocking(move || {
            let missing: Vec<String> = moves
                .iter()
                .filter(|(from, _, required)| *required && !from.exists())
                .map(|(from, _, _)| display_relative(&root, from))
                .collect();
            if !missing.is_empty() {
                tracing::debug!(missing = ?missing, "rename source incomplete");
                return Err(ServiceError::GameNotFound(old_name));
            }

            let taken: Vec<String> = moves
                .iter()
                .filter(|(_, to, _)| to.exists())
                .map(|(_, to, _)| display_relative(&root, to))
                .collect();
            if !taken.is_empty() {
                return Err(ServiceError::Conflict(format!(
                    "game directories already exist: {}",
                    taken.join(", ")
                )));
            }

            let mut moved: Vec<(&PathBuf, &PathBuf)> = Vec::new();
            for (from, to, _) in &moves {
                if !from.exists() {
                    continue;
                }
                if let Err(e) = std::fs::rename(from, to) {
                    for (back_to, back_from) in moved.iter().rev() {
                        if let Err(undo) = std::fs::rename(back_from, back_to) {
                            tracing::error!(
                                from = %back_from.display(),
                                to = %back_to.display(),
                                error = %undo,
                                "failed to roll back game rename"
                            );
                        }
                    }
                    return Err(e.into());
                }
                moved.push((from, to));
            }

            Ok(moved
                .iter()
                .map(|(_, to)| display_relative(&root, to))
                .collect::<Vec<_>>())
        })
        .await?;

        self.ledger.rename(user, old, new).await?;

        tracing::info!(user, old, new, "game renamed");
        Ok(GameRename {
            old_name: old.to_string(),
            new_name: new.to_string(),
            renamed_paths: renamed,
        })
    }
}

async fn run_blocking<T, F>(f: F) -> ServiceResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::TaskFailed(e.to_string()))?
}

/// Delete the files under `root` whose scan keys are in `keys`.
///
/// Paths come from walking the tree again, never from parsing a key, so a
/// key always removes the file that produced it. Keys with no file left are
/// logged.
async fn delete_extras(root: PathBuf, keys: Vec<String>) -> ServiceResult<usize> {
    run_blocking(move || {
        let mut pending: HashSet<String> = keys.into_iter().collect();
        let mut deleted = 0;

        for entry in TreeWalker::new(&root) {
            if pending.is_empty() {
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "skipping entry while deleting extras");
                    continue;
                }
            };
            if !pending.remove(&entry.key) {
                continue;
            }

            match std::fs::remove_file(&entry.path) {
                Ok(()) => {
                    deleted += 1;
                    tracing::debug!(path = %entry.path.display(), "deleted extra file");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!(path = %entry.path.display(), "extra file already gone");
                }
                Err(e) => return Err(e.into()),
            }
        }

        for key in &pending {
            tracing::warn!(root = %root.display(), key, "extra file already gone");
        }
        Ok(deleted)
    })
    .await
}

async fn write_body<S, E>(path: &Path, body: S) -> ServiceResult<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    futures::pin_mut!(body);
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(io::Error::other)?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

fn remove_dir_if_present(path: &Path) -> ServiceResult<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
