//! On-disk backup storage
//!
//! Each backup lives in `<backup_root>/<operation_id>_<timestamp>/` with the
//! copied files under `files/` (relative to the common root of the backed-up
//! paths) and a `manifest.json` describing them.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::{BackupHandle, BackupInfo, BackupService};
use crate::error::{RefactoringError, Result};

const MANIFEST_FILE: &str = "manifest.json";
const FILES_DIR: &str = "files";

/// Manifest persisted next to the backed-up files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub operation_id: String,
    pub timestamp: DateTime<Utc>,
    pub project_root: Option<PathBuf>,
    pub files: Vec<ManifestEntry>,
}

/// One backed-up file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub original_path: PathBuf,
    /// Relative to the backup's `files/` directory
    pub backup_path: PathBuf,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
}

/// Backup service storing snapshots under a root directory
pub struct FileBackupService {
    backup_root: PathBuf,
    active: Mutex<HashMap<String, PathBuf>>,
}

impl FileBackupService {
    /// Create a service storing backups under `backup_root`
    pub fn new(backup_root: impl Into<PathBuf>) -> Result<Self> {
        let backup_root = backup_root.into();
        fs::create_dir_all(&backup_root)?;
        debug!(root = %backup_root.display(), "Backup service initialized");
        Ok(Self {
            backup_root,
            active: Mutex::new(HashMap::new()),
        })
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Read the manifest of a stored backup
    pub fn manifest(&self, operation_id: &str) -> Option<BackupManifest> {
        let backup_dir = self.locate(operation_id)?;
        read_manifest(&backup_dir).ok()
    }

    fn locate(&self, operation_id: &str) -> Option<PathBuf> {
        if let Some(dir) = self.active.lock().get(operation_id) {
            if dir.exists() {
                return Some(dir.clone());
            }
        }
        self.find_by_operation_id(operation_id)
    }

    fn find_by_operation_id(&self, operation_id: &str) -> Option<PathBuf> {
        let prefix = format!("{}_", operation_id);
        let entries = fs::read_dir(&self.backup_root).ok()?;

        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with(&prefix))
            })
            .find(|path| {
                read_manifest(path).is_ok_and(|manifest| manifest.operation_id == operation_id)
            })
    }

    fn write_backup(
        &self,
        operation_id: &str,
        backup_dir: &Path,
        files: &[PathBuf],
        timestamp: DateTime<Utc>,
    ) -> Result<BackupManifest> {
        fs::create_dir_all(backup_dir)?;

        let sources = files
            .iter()
            .map(|file| {
                fs::canonicalize(file).map_err(|e| {
                    RefactoringError::Other(format!("cannot back up {}: {}", file.display(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let project_root = common_root(&sources);

        let mut entries = Vec::with_capacity(sources.len());
        for source in &sources {
            let relative = relative_backup_path(source, project_root.as_deref());
            let target = backup_dir.join(FILES_DIR).join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(source, &target)?;

            let metadata = fs::metadata(source)?;
            entries.push(ManifestEntry {
                original_path: source.clone(),
                backup_path: relative,
                size: metadata.len(),
                mtime: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
            debug!(source = %source.display(), target = %target.display(), "Backed up file");
        }

        let manifest = BackupManifest {
            operation_id: operation_id.to_string(),
            timestamp,
            project_root,
            files: entries,
        };
        fs::write(
            backup_dir.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;
        Ok(manifest)
    }
}

impl BackupService for FileBackupService {
    fn create_backup(&self, operation_id: &str, files: &[PathBuf]) -> Result<BackupHandle> {
        let timestamp = Utc::now();
        let backup_dir = self.backup_root.join(format!(
            "{}_{}",
            operation_id,
            timestamp.format("%Y%m%d_%H%M%S_%6f")
        ));

        match self.write_backup(operation_id, &backup_dir, files, timestamp) {
            Ok(manifest) => {
                self.active
                    .lock()
                    .insert(operation_id.to_string(), backup_dir.clone());
                info!(
                    operation_id,
                    files = manifest.files.len(),
                    dir = %backup_dir.display(),
                    "Created backup"
                );
                Ok(BackupHandle {
                    operation_id: operation_id.to_string(),
                    backup_dir,
                    created_at: timestamp,
                    file_count: manifest.files.len(),
                })
            }
            Err(e) => {
                error!(operation_id, error = %e, "Failed to create backup");
                if backup_dir.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&backup_dir) {
                        warn!(
                            dir = %backup_dir.display(),
                            error = %cleanup,
                            "Failed to remove partial backup"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn restore_backup(&self, operation_id: &str) -> bool {
        let Some(backup_dir) = self.locate(operation_id) else {
            error!(operation_id, "No backup found for operation");
            return false;
        };

        let manifest = match read_manifest(&backup_dir) {
            Ok(manifest) => manifest,
            Err(e) => {
                error!(operation_id, error = %e, "Backup manifest unreadable");
                return false;
            }
        };

        let mut restored = 0;
        for entry in &manifest.files {
            let backup_file = backup_dir.join(FILES_DIR).join(&entry.backup_path);
            if !backup_file.exists() {
                warn!(file = %backup_file.display(), "Backup file missing");
                continue;
            }
            let copied = entry
                .original_path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::copy(&backup_file, &entry.original_path));
            match copied {
                Ok(_) => {
                    restored += 1;
                    debug!(file = %entry.original_path.display(), "Restored file");
                }
                Err(e) => {
                    error!(
                        file = %entry.original_path.display(),
                        error = %e,
                        "Failed to restore file"
                    );
                    return false;
                }
            }
        }

        info!(operation_id, restored, "Restored backup");
        true
    }

    fn cleanup_backup(&self, operation_id: &str) -> bool {
        let Some(backup_dir) = self.locate(operation_id) else {
            warn!(operation_id, "No backup found to clean up");
            return false;
        };

        match fs::remove_dir_all(&backup_dir) {
            Ok(()) => {
                self.active.lock().remove(operation_id);
                info!(operation_id, "Cleaned up backup");
                true
            }
            Err(e) => {
                error!(operation_id, error = %e, "Failed to clean up backup");
                false
            }
        }
    }

    fn list_backups(&self) -> Vec<BackupInfo> {
        let Ok(entries) = fs::read_dir(&self.backup_root) else {
            return Vec::new();
        };

        let mut backups: Vec<BackupInfo> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.join(MANIFEST_FILE).is_file())
            .filter_map(|path| match read_manifest(&path) {
                Ok(manifest) => Some(BackupInfo {
                    operation_id: manifest.operation_id,
                    timestamp: manifest.timestamp,
                    file_count: manifest.files.len(),
                    project_root: manifest.project_root,
                    backup_dir: path,
                }),
                Err(e) => {
                    warn!(dir = %path.display(), error = %e, "Skipping unreadable backup manifest");
                    None
                }
            })
            .collect();

        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        backups
    }
}

fn read_manifest(backup_dir: &Path) -> Result<BackupManifest> {
    let content = fs::read_to_string(backup_dir.join(MANIFEST_FILE))?;
    Ok(serde_json::from_str(&content)?)
}

/// Longest directory prefix shared by every path
fn common_root(paths: &[PathBuf]) -> Option<PathBuf> {
    let (first, rest) = paths.split_first()?;
    let mut shared: Vec<Component<'_>> = first.parent()?.components().collect();

    for path in rest {
        let matching = shared
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        shared.truncate(matching);
    }

    (!shared.is_empty()).then(|| shared.iter().collect())
}

fn relative_backup_path(source: &Path, root: Option<&Path>) -> PathBuf {
    root.and_then(|root| source.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| {
            source
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .collect()
        })
}
