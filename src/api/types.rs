use crate::sync::SyncReport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesDataResponse {
    pub files_data: SyncReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub extracted_to: String,
    pub files_extracted: u64,
    pub backup: String,
    pub evicted_backups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadQuery {
    pub game_name: String,
}

/// Identifies one backup of one game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRequest {
    pub game_name: String,
    pub backup_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub msg: String,
    pub files_restored: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgResponse {
    pub msg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteGameQuery {
    #[serde(default)]
    pub delete_backups: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameGameQuery {
    pub new_game_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameGameResponse {
    pub message: String,
    pub renamed_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamesListResponse {
    pub games_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatusResponse {
    pub token_status: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
