//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use refactor_broker::{
    safety::BackupHandle, AnalysisResult, AnalyzeParams, BackupService, ExtractParams,
    ExtractResult, FindParams, FindResult, Language, Operation, OperationFailure,
    OperationParameters, RefactoringError, RefactoringProvider, RenameParams, RenameResult,
    Result, ShowParams, ShowResult,
};
use tempfile::TempDir;

/// How a scripted provider answers every call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    ReturnConflict,
    Raise,
}

/// Provider with fixed capabilities and a fixed answer
pub struct ScriptedProvider {
    name: String,
    operations: Vec<Operation>,
    behavior: Behavior,
    affected: Vec<PathBuf>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &str, operations: &[Operation], behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            operations: operations.to_vec(),
            behavior,
            affected: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_affected_files(mut self, files: Vec<PathBuf>) -> Self {
        self.affected = files;
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, operation: Operation) -> Result<Option<OperationFailure>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(None),
            Behavior::ReturnConflict => Ok(Some(OperationFailure::naming_conflict("taken"))),
            Behavior::Raise => Err(RefactoringError::provider(
                &self.name,
                operation.as_str(),
                "internal failure",
            )),
        }
    }
}

impl RefactoringProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_language(&self, language: Language) -> bool {
        language == Language::Python
    }

    fn capabilities(&self, language: Language) -> Vec<Operation> {
        if self.supports_language(language) {
            self.operations.clone()
        } else {
            Vec::new()
        }
    }

    fn analyze_symbol(&self, _params: &AnalyzeParams) -> Result<AnalysisResult> {
        Ok(match self.answer(Operation::AnalyzeSymbol)? {
            Some(failure) => AnalysisResult::failed(failure),
            None => AnalysisResult {
                success: true,
                ..Default::default()
            },
        })
    }

    fn find_symbols(&self, params: &FindParams) -> Result<FindResult> {
        Ok(match self.answer(Operation::FindSymbols)? {
            Some(failure) => FindResult::failed(failure),
            None => FindResult {
                success: true,
                pattern: Some(params.pattern.clone()),
                ..Default::default()
            },
        })
    }

    fn rename_symbol(&self, params: &RenameParams) -> Result<RenameResult> {
        Ok(match self.answer(Operation::RenameSymbol)? {
            Some(failure) => RenameResult::failed(failure),
            None => RenameResult {
                success: true,
                old_name: Some(params.symbol.clone()),
                new_name: Some(params.new_name.clone()),
                references_updated: 1,
                files_modified: self.affected.clone(),
                ..Default::default()
            },
        })
    }

    fn extract_element(&self, params: &ExtractParams) -> Result<ExtractResult> {
        Ok(match self.answer(Operation::ExtractElement)? {
            Some(failure) => ExtractResult::failed(failure),
            None => ExtractResult {
                success: true,
                source: Some(params.source.clone()),
                new_function_name: Some(params.new_name.clone()),
                ..Default::default()
            },
        })
    }

    fn show_function(&self, params: &ShowParams) -> Result<ShowResult> {
        Ok(match self.answer(Operation::ShowFunction)? {
            Some(failure) => ShowResult::failed(failure),
            None => ShowResult {
                success: true,
                function_name: Some(params.function_name.clone()),
                ..Default::default()
            },
        })
    }

    fn affected_files(&self, _params: &OperationParameters) -> Result<Vec<PathBuf>> {
        Ok(self.affected.clone())
    }
}

/// Backup service that records every call
#[derive(Default)]
pub struct CountingBackups {
    pub fail_create: bool,
    pub created: Mutex<Vec<String>>,
    pub restored: Mutex<Vec<String>>,
    pub cleaned: Mutex<Vec<String>>,
}

impl BackupService for CountingBackups {
    fn create_backup(&self, operation_id: &str, files: &[PathBuf]) -> Result<BackupHandle> {
        if self.fail_create {
            return Err(RefactoringError::Other("backup volume unavailable".to_string()));
        }
        self.created.lock().push(operation_id.to_string());
        Ok(BackupHandle {
            operation_id: operation_id.to_string(),
            backup_dir: PathBuf::from("/nowhere"),
            created_at: chrono::Utc::now(),
            file_count: files.len(),
        })
    }

    fn restore_backup(&self, operation_id: &str) -> bool {
        self.restored.lock().push(operation_id.to_string());
        true
    }

    fn cleanup_backup(&self, operation_id: &str) -> bool {
        self.cleaned.lock().push(operation_id.to_string());
        true
    }
}

/// Write `files` into a fresh temporary project
pub fn project(files: &[(&str, &str)]) -> std::io::Result<TempDir> {
    let dir = TempDir::new()?;
    for (path, content) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, content)?;
    }
    Ok(dir)
}

pub fn read(dir: &Path, file: &str) -> std::io::Result<String> {
    std::fs::read_to_string(dir.join(file))
}
