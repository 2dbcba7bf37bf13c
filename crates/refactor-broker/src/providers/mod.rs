//! Provider contract and registry
//!
//! A provider is a concrete refactoring backend. It advertises the languages
//! it handles and the operations it supports per language. Expected failures
//! (symbol not found, naming conflicts, bad source references) are returned
//! inside the result; an `Err` means the backend hit an internal fault and the
//! executor may try the next candidate.

pub mod registry;

pub use registry::{ProviderHealth, ProviderRegistry, RegisteredProvider};

use std::path::PathBuf;

use crate::error::Result;
use crate::language::Language;
use crate::types::{
    AnalysisResult, AnalyzeParams, ExtractParams, ExtractResult, FindParams, FindResult, Operation,
    OperationParameters, OperationResult, RenameParams, RenameResult, ShowParams, ShowResult,
};

/// Trait for refactoring backends
pub trait RefactoringProvider: Send + Sync {
    /// Stable name; registering a second provider with the same name replaces the first
    fn name(&self) -> &str;

    /// Whether the provider handles `language` at all
    fn supports_language(&self, language: Language) -> bool;

    /// Operations supported for `language`, empty when the language is unsupported
    fn capabilities(&self, language: Language) -> Vec<Operation>;

    fn analyze_symbol(&self, params: &AnalyzeParams) -> Result<AnalysisResult>;

    fn find_symbols(&self, params: &FindParams) -> Result<FindResult>;

    fn rename_symbol(&self, params: &RenameParams) -> Result<RenameResult>;

    fn extract_element(&self, params: &ExtractParams) -> Result<ExtractResult>;

    fn show_function(&self, params: &ShowParams) -> Result<ShowResult>;

    /// Provider-reported health; `None` leaves the decision to the registry score
    fn is_healthy(&self) -> Option<bool> {
        None
    }

    /// Files a destructive request would touch, used to scope its backup
    ///
    /// An empty list means the provider cannot tell ahead of time.
    fn affected_files(&self, _params: &OperationParameters) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// Route a request to the provider method matching its variant
pub fn dispatch(
    provider: &dyn RefactoringProvider,
    params: &OperationParameters,
) -> Result<OperationResult> {
    Ok(match params {
        OperationParameters::Analyze(p) => OperationResult::Analyze(provider.analyze_symbol(p)?),
        OperationParameters::Find(p) => OperationResult::Find(provider.find_symbols(p)?),
        OperationParameters::Rename(p) => OperationResult::Rename(provider.rename_symbol(p)?),
        OperationParameters::Extract(p) => OperationResult::Extract(provider.extract_element(p)?),
        OperationParameters::Show(p) => OperationResult::Show(provider.show_function(p)?),
    })
}
