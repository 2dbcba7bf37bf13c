//! Backup guard for destructive operations
//!
//! `Idle -> BackupCreated -> {Committed | Preserved}`. Any result returned by
//! the operation, successful or not, commits and cleans up the backup. A
//! raised error preserves it and is re-raised with the operation id attached
//! so the files can be restored by hand.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::BackupService;
use crate::error::{RefactoringError, Result};
use crate::types::OperationResult;

/// Lifecycle of one guarded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    BackupCreated,
    Committed,
    Preserved,
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GuardState::Idle => "idle",
            GuardState::BackupCreated => "backup_created",
            GuardState::Committed => "committed",
            GuardState::Preserved => "preserved",
        };
        f.write_str(name)
    }
}

/// Wraps destructive operations in a backup
#[derive(Clone)]
pub struct BackupGuard {
    service: Arc<dyn BackupService>,
}

impl BackupGuard {
    pub fn new(service: Arc<dyn BackupService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<dyn BackupService> {
        &self.service
    }

    /// Back up `files`, run `operation`, then clean up or preserve
    ///
    /// With no files the backup step is skipped. A backup failure aborts
    /// before `operation` runs.
    pub fn run<F>(
        &self,
        operation_id: &str,
        files: &[PathBuf],
        operation: F,
    ) -> Result<OperationResult>
    where
        F: FnOnce() -> Result<OperationResult>,
    {
        let mut state = GuardState::Idle;

        if !files.is_empty() {
            self.service
                .create_backup(operation_id, files)
                .map_err(|e| RefactoringError::BackupFailed {
                    operation_id: operation_id.to_string(),
                    reason: e.to_string(),
                })?;
            state = self.transition(operation_id, state, GuardState::BackupCreated);
        } else {
            debug!(operation_id, "No affected files known, skipping backup");
        }
        let backed_up = state == GuardState::BackupCreated;

        match operation() {
            Ok(mut result) => {
                if backed_up {
                    if !self.service.cleanup_backup(operation_id) {
                        warn!(operation_id, "Backup cleanup failed");
                    }
                    // A failed result keeps its success-only fields empty
                    if result.success() {
                        result.set_backup_id(operation_id);
                    }
                    self.transition(operation_id, state, GuardState::Committed);
                }
                Ok(result)
            }
            Err(e) => {
                if backed_up {
                    self.transition(operation_id, state, GuardState::Preserved);
                    error!(
                        operation_id,
                        error = %e,
                        "Operation failed, backup preserved for manual restore"
                    );
                }
                Err(RefactoringError::OperationFailed {
                    operation_id: operation_id.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    fn transition(&self, operation_id: &str, from: GuardState, to: GuardState) -> GuardState {
        info!(operation_id, from = %from, to = %to, "Backup state changed");
        to
    }
}
