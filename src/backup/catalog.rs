use crate::archive::ARCHIVE_SUFFIX;
use crate::backup::error::{BackupError, BackupResult};
use crate::backup::types::BackupInfo;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read-side view over backup collections.
///
/// A collection is one directory; its backups are the regular files ending
/// in `.tar.gz`. Anything else in it (temporary files of an in-flight
/// backup, stray files) is ignored.
pub struct BackupCatalog;

impl BackupCatalog {
    /// Backup filenames in `collection`, in ascending name order.
    /// A missing collection is empty.
    pub fn list(collection: &Path) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(collection) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(ARCHIVE_SUFFIX) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Backups with their sizes, in ascending name order
    pub fn describe(collection: &Path) -> io::Result<Vec<BackupInfo>> {
        Self::list(collection)?
            .into_iter()
            .map(|filename| {
                let size_bytes = fs::metadata(collection.join(&filename))?.len();
                Ok(BackupInfo {
                    filename,
                    size_bytes,
                })
            })
            .collect()
    }

    /// Every game's backups under a user's backup root
    pub fn describe_all(user_root: &Path) -> io::Result<BTreeMap<String, Vec<BackupInfo>>> {
        let mut games = BTreeMap::new();

        let entries = match fs::read_dir(user_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(games),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let game = entry.file_name().to_string_lossy().into_owned();
            games.insert(game, Self::describe(&entry.path())?);
        }

        Ok(games)
    }

    /// Path of a named backup, if it exists
    pub fn locate(collection: &Path, filename: &str) -> BackupResult<PathBuf> {
        crate::tree::validate_name("backup", filename)
            .map_err(|_| BackupError::NotFound(filename.to_string()))?;

        let path = collection.join(filename);
        if filename.ends_with(ARCHIVE_SUFFIX) && path.is_file() {
            Ok(path)
        } else {
            Err(BackupError::NotFound(filename.to_string()))
        }
    }

    pub fn remove(collection: &Path, filename: &str) -> BackupResult<()> {
        let path = Self::locate(collection, filename)?;
        fs::remove_file(&path)?;
        tracing::info!(backup = %path.display(), "backup deleted");
        Ok(())
    }
}
