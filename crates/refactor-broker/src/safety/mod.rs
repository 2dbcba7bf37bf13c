//! Backups around destructive operations

pub mod backup;
pub mod guard;

pub use backup::{BackupManifest, FileBackupService, ManifestEntry};
pub use guard::{BackupGuard, GuardState};

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Token correlating an operation with its backed-up files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupHandle {
    pub operation_id: String,
    pub backup_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub file_count: usize,
}

/// Summary of a stored backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub operation_id: String,
    pub timestamp: DateTime<Utc>,
    pub backup_dir: PathBuf,
    pub file_count: usize,
    pub project_root: Option<PathBuf>,
}

/// Snapshot storage used by the backup guard
///
/// `create_backup` is all-or-nothing: either every file is captured or an
/// error is returned and nothing is left behind.
pub trait BackupService: Send + Sync {
    fn create_backup(&self, operation_id: &str, files: &[PathBuf]) -> Result<BackupHandle>;

    /// Copy the backed-up files over their originals
    fn restore_backup(&self, operation_id: &str) -> bool;

    /// Delete the backup
    fn cleanup_backup(&self, operation_id: &str) -> bool;

    /// Stored backups, newest first
    fn list_backups(&self) -> Vec<BackupInfo> {
        Vec::new()
    }
}
