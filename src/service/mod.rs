//! Per-user orchestration of scanning, reconciliation, archiving and
//! backups over the storage layout.

pub mod error;
pub mod service;
pub mod types;

pub use error::{ServiceError, ServiceResult};
pub use service::SaveSyncService;
pub use types::{
    CoreFailure, ErrorKind, GameDeletion, GameRename, Identity, StagedUpload, SyncOutcome,
    UploadOutcome,
};
