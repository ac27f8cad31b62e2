use crate::archive::{ArchiveOptions, DEFAULT_CHUNK_SIZE, DEFAULT_COMPRESSION_LEVEL};
use crate::backup::BackupNaming;
use crate::config::error::{ConfigError, ConfigResult};
use crate::integrity::ChecksumType;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Server settings, read from a JSON file. Every field is optional in the
/// file and falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,

    /// Directory holding `saves/`, `backups/`, `resources/` and `tmp_data/`
    pub data_root: PathBuf,

    /// Backups kept per game (N); must be at least 1
    pub backups_limit: usize,

    /// Stream-mode chunk size in bytes
    pub chunk_size: usize,

    /// gzip level, 0-9
    pub compression_level: u32,

    pub checksum: ChecksumType,

    pub backup_naming: BackupNaming,

    pub database_url: String,

    /// Dedicated Prometheus listener; disabled when absent
    pub metrics_addr: Option<SocketAddr>,

    /// API token -> username
    pub api_tokens: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            data_root: PathBuf::from("data"),
            backups_limit: 5,
            chunk_size: DEFAULT_CHUNK_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            checksum: ChecksumType::default(),
            backup_naming: BackupNaming::default(),
            database_url: "sqlite://savesync.db".to_string(),
            metrics_addr: None,
            api_tokens: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "settings file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.backups_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "backups_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.compression_level > 9 {
            return Err(ConfigError::Invalid {
                field: "compression_level",
                reason: format!("{} is not in 0..=9", self.compression_level),
            });
        }
        Ok(())
    }

    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions::default()
            .with_chunk_size(self.chunk_size)
            .with_compression_level(self.compression_level)
    }
}

/// Settings shared between the service and the server, reloadable at
/// runtime. Readers take a snapshot per operation.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<ServerConfig>>,
    path: Option<PathBuf>,
}

impl SharedConfig {
    /// Settings not backed by a file; `reload` keeps them as they are
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let config = ServerConfig::load(&path)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(path),
        })
    }

    pub fn snapshot(&self) -> ServerConfig {
        self.inner.read().clone()
    }

    pub fn backups_limit(&self) -> usize {
        self.inner.read().backups_limit
    }

    /// Username an API token belongs to
    pub fn token_owner(&self, token: &str) -> Option<String> {
        self.inner.read().api_tokens.get(token).cloned()
    }

    /// Re-read the settings file. On error the current settings stay in
    /// effect.
    pub fn reload(&self) -> ConfigResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let config = ServerConfig::load(path)?;
        tracing::info!(
            path = %path.display(),
            backups_limit = config.backups_limit,
            "settings reloaded"
        );
        *self.inner.write() = config;
        Ok(())
    }

    /// Apply an in-place change, rejecting it if the result is invalid
    pub fn update(&self, f: impl FnOnce(&mut ServerConfig)) -> ConfigResult<()> {
        let mut candidate = self.snapshot();
        f(&mut candidate);
        candidate.validate()?;
        *self.inner.write() = candidate;
        Ok(())
    }
}
