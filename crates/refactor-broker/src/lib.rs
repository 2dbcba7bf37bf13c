//! Refactoring Broker
//!
//! Routes symbolic refactoring requests (analyze, find, show, rename,
//! extract) to registered language backends and returns structured,
//! serializable results.
//!
//! # Architecture
//!
//! - **Symbol Resolver**: maps bare or dotted names to definitions using tree-sitter
//! - **Providers**: backends implementing [`RefactoringProvider`], advertising capabilities per language
//! - **Provider Registry**: priority ordering, capability caches and health tracking
//! - **Fallback Executor**: tries capable providers in order; returned failures are final, raised errors fall through
//! - **Backup Guard**: backs up affected files around rename and extract
//!
//! Expected failures (unknown symbol, naming conflict, bad source reference)
//! come back as results with `success == false`. Only infrastructure faults
//! are returned as [`RefactoringError`].
//!
//! # Example
//!
//! ```ignore
//! use refactor_broker::{BrokerConfig, RefactoringBroker, RenameParams};
//!
//! let broker = RefactoringBroker::with_python("/path/to/project", BrokerConfig::default())?;
//! let result = broker.rename_symbol(RenameParams::new("calculate_sum", "add_numbers"))?;
//! assert!(result.success);
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod executor;
pub mod language;
pub mod providers;
pub mod resolver;
pub mod safety;
pub mod tracking;
pub mod types;
pub mod validation;

pub use adapters::PythonAstProvider;
pub use config::{BrokerConfig, ConfigLoader};
pub use error::{RefactoringError, Result};
pub use executor::FallbackExecutor;
pub use language::{detect_language, detect_project_language, find_project_root, Language};
pub use providers::{ProviderHealth, ProviderRegistry, RefactoringProvider, RegisteredProvider};
pub use resolver::{Resolution, SymbolResolver};
pub use safety::{BackupGuard, BackupHandle, BackupInfo, BackupService, FileBackupService};
pub use tracking::{track_operation, OperationMetrics};
pub use types::{
    AnalysisResult, AnalyzeParams, ElementKind, ErrorKind, ExtractParams, ExtractResult,
    ExtractableElement, FindParams, FindResult, Location, Operation, OperationFailure,
    OperationOutcome, OperationParameters, OperationResult, RenameParams, RenameResult,
    ShowParams, ShowResult, SymbolDescriptor, SymbolKind, SymbolScope,
};
pub use validation::ParameterValidator;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

/// Priority given to the built-in Python backend
pub const DEFAULT_PROVIDER_PRIORITY: i32 = 10;

/// Composition root owning the registry, executor and backup guard of one project
pub struct RefactoringBroker {
    config: BrokerConfig,
    project_root: PathBuf,
    registry: Arc<ProviderRegistry>,
    executor: FallbackExecutor,
    guard: BackupGuard,
    project_language: OnceCell<Option<Language>>,
}

impl RefactoringBroker {
    /// Create a broker with an empty registry
    pub fn new(
        project_root: impl Into<PathBuf>,
        config: BrokerConfig,
        backups: Arc<dyn BackupService>,
    ) -> Self {
        let registry = Arc::new(ProviderRegistry::new(&config.health));
        Self {
            project_root: project_root.into(),
            executor: FallbackExecutor::new(registry.clone()),
            guard: BackupGuard::new(backups),
            registry,
            config,
            project_language: OnceCell::new(),
        }
    }

    /// Create a broker with on-disk backups and the built-in Python backend registered
    pub fn with_python(project_root: impl Into<PathBuf>, config: BrokerConfig) -> Result<Self> {
        config.validate()?;
        let project_root = project_root.into();
        let backups = Arc::new(FileBackupService::new(config.backup.resolved_dir())?);
        let provider = Arc::new(PythonAstProvider::with_config(&project_root, &config));

        let broker = Self::new(project_root, config, backups);
        broker.register(provider, DEFAULT_PROVIDER_PRIORITY);
        Ok(broker)
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Register a provider with the broker's registry
    pub fn register(&self, provider: Arc<dyn RefactoringProvider>, priority: i32) {
        self.registry.register(provider, priority);
    }

    /// Language a request is routed on
    ///
    /// The request's file path wins, then the project's dominant language,
    /// then the configured default.
    pub fn language_for(&self, params: &OperationParameters) -> Language {
        if let Some(path) = params.file_path() {
            return detect_language(path);
        }
        self.project_language
            .get_or_init(|| detect_project_language(&self.project_root))
            .unwrap_or(self.config.default_language)
    }

    /// Validate, route and run a request
    pub fn execute(&self, params: OperationParameters) -> Result<OperationResult> {
        let (result, _metrics) =
            track_operation(params.operation(), params.target(), || self.run(&params));
        result
    }

    fn run(&self, params: &OperationParameters) -> Result<OperationResult> {
        let operation = params.operation();
        if let Some(failure) = ParameterValidator::validate(params) {
            debug!(operation = %operation, message = %failure.message, "Rejected request");
            return Ok(OperationResult::failed(operation, failure));
        }

        let language = self.language_for(params);
        if !operation.is_destructive() {
            return self.executor.execute(language, params);
        }

        let operation_id = Uuid::new_v4().to_string();
        let files = self.affected_files(language, params);
        debug!(
            operation_id = %operation_id,
            operation = %operation,
            files = files.len(),
            "Running guarded operation"
        );
        self.guard
            .run(&operation_id, &files, || self.executor.execute(language, params))
    }

    /// Files the top-ranked capable provider expects to touch
    fn affected_files(&self, language: Language, params: &OperationParameters) -> Vec<PathBuf> {
        let Some(candidate) = self
            .executor
            .candidates(language, params.operation())
            .into_iter()
            .next()
        else {
            return Vec::new();
        };

        candidate
            .provider
            .affected_files(params)
            .unwrap_or_else(|e| {
                warn!(provider = %candidate.name, error = %e, "Could not compute affected files");
                Vec::new()
            })
    }

    pub fn analyze_symbol(&self, params: AnalyzeParams) -> Result<AnalysisResult> {
        match self.execute(params.into())? {
            OperationResult::Analyze(result) => Ok(result),
            other => Err(unexpected_variant(&other, Operation::AnalyzeSymbol)),
        }
    }

    pub fn find_symbols(&self, params: FindParams) -> Result<FindResult> {
        match self.execute(params.into())? {
            OperationResult::Find(result) => Ok(result),
            other => Err(unexpected_variant(&other, Operation::FindSymbols)),
        }
    }

    pub fn show_function(&self, params: ShowParams) -> Result<ShowResult> {
        match self.execute(params.into())? {
            OperationResult::Show(result) => Ok(result),
            other => Err(unexpected_variant(&other, Operation::ShowFunction)),
        }
    }

    pub fn rename_symbol(&self, params: RenameParams) -> Result<RenameResult> {
        match self.execute(params.into())? {
            OperationResult::Rename(result) => Ok(result),
            other => Err(unexpected_variant(&other, Operation::RenameSymbol)),
        }
    }

    pub fn extract_element(&self, params: ExtractParams) -> Result<ExtractResult> {
        match self.execute(params.into())? {
            OperationResult::Extract(result) => Ok(result),
            other => Err(unexpected_variant(&other, Operation::ExtractElement)),
        }
    }

    /// Restore the files saved for a failed operation
    pub fn restore_backup(&self, operation_id: &str) -> bool {
        self.guard.service().restore_backup(operation_id)
    }

    /// Backups kept after failed operations, newest first
    pub fn list_backups(&self) -> Vec<BackupInfo> {
        self.guard.service().list_backups()
    }
}

fn unexpected_variant(result: &OperationResult, expected: Operation) -> RefactoringError {
    RefactoringError::Other(format!(
        "expected a {} result, got {}",
        expected,
        result.operation()
    ))
}
