//! On-disk layout of the save store
//!
//! ```text
//! <root>/saves/<user>/<game>/...                  live tree, hashed
//! <root>/backups/<user>/<game>/<timestamp>.tar.gz rotated backups
//! <root>/resources/<user>/<game>                  cover art
//! <root>/tmp_data/<user>/...                      upload staging
//! ```

use crate::tree::error::{TreeError, TreeResult};
use std::path::{Component, Path, PathBuf};

const SAVES_DIR: &str = "saves";
const BACKUPS_DIR: &str = "backups";
const RESOURCES_DIR: &str = "resources";
const STAGING_DIR: &str = "tmp_data";

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the top-level directories if they are missing
    pub fn ensure_roots(&self) -> TreeResult<()> {
        for dir in [SAVES_DIR, BACKUPS_DIR, RESOURCES_DIR, STAGING_DIR] {
            std::fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    pub fn user_saves(&self, user: &str) -> PathBuf {
        self.root.join(SAVES_DIR).join(user)
    }

    pub fn game_saves(&self, user: &str, game: &str) -> PathBuf {
        self.user_saves(user).join(game)
    }

    pub fn user_backups(&self, user: &str) -> PathBuf {
        self.root.join(BACKUPS_DIR).join(user)
    }

    pub fn game_backups(&self, user: &str, game: &str) -> PathBuf {
        self.user_backups(user).join(game)
    }

    pub fn game_resources(&self, user: &str, game: &str) -> PathBuf {
        self.root.join(RESOURCES_DIR).join(user).join(game)
    }

    pub fn staging(&self, user: &str) -> PathBuf {
        self.root.join(STAGING_DIR).join(user)
    }
}

/// Reject names that cannot be used as a single path segment
pub fn validate_name(kind: &'static str, name: &str) -> TreeResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(TreeError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Root-relative key for `path`, always `/`-separated with a leading `/`.
///
/// `None` when `path` is not under `root` or a component is not valid UTF-8.
/// A `\` inside a file name is kept as-is, it is not a separator here.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut key = String::new();

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                key.push('/');
                key.push_str(part.to_str()?);
            }
            Component::CurDir => {}
            _ => return None,
        }
    }

    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Canonical form of a client-supplied key.
///
/// Both `/` and `\` separate segments; empty and `.` segments are dropped
/// and the result has a single leading `/`. Keys with `..`, NUL or no
/// segments at all are rejected.
pub fn normalize_key(key: &str) -> TreeResult<String> {
    let invalid = || TreeError::InvalidKey(key.to_string());
    let mut normalized = String::with_capacity(key.len() + 1);

    for part in key.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return Err(invalid()),
            part if part.contains('\0') => return Err(invalid()),
            part => {
                normalized.push('/');
                normalized.push_str(part);
            }
        }
    }

    if normalized.is_empty() {
        return Err(invalid());
    }
    Ok(normalized)
}
