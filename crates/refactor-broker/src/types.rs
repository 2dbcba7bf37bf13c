//! Core types for the refactoring broker
//!
//! Parameters and results are plain serde models so the typed
//! `OperationParameters -> OperationResult` contract can be exposed by any
//! transport without extra mapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::RefactoringError;

/// A refactoring capability a provider can advertise per language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    AnalyzeSymbol,
    FindSymbols,
    RenameSymbol,
    ExtractElement,
    ShowFunction,
}

impl Operation {
    /// Every capability, in declaration order
    pub const ALL: [Operation; 5] = [
        Operation::AnalyzeSymbol,
        Operation::FindSymbols,
        Operation::RenameSymbol,
        Operation::ExtractElement,
        Operation::ShowFunction,
    ];

    /// Wire name of the capability
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::AnalyzeSymbol => "analyze_symbol",
            Operation::FindSymbols => "find_symbols",
            Operation::RenameSymbol => "rename_symbol",
            Operation::ExtractElement => "extract_element",
            Operation::ShowFunction => "show_function",
        }
    }

    /// Whether the operation may mutate source files
    pub fn is_destructive(&self) -> bool {
        matches!(self, Operation::RenameSymbol | Operation::ExtractElement)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = RefactoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| RefactoringError::Other(format!("Unknown operation: {}", s)))
    }
}

/// Failure taxonomy shared by returned results and raised errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationFailed,
    SymbolNotFound,
    FunctionNotFound,
    AmbiguousSymbol,
    NamingConflict,
    InvalidSource,
    ResourceNotFound,
    UnsupportedLanguage,
    OperationUnsupported,
    ProviderFailure,
    AllProvidersFailed,
    BackupFailed,
}

/// Kind of a named code entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Variable,
    Method,
}

impl SymbolKind {
    /// Functions and methods can be shown and extracted from
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

/// Scope enclosing a symbol definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolScope {
    Global,
    Class,
    Function,
    Private,
}

/// A position in a source file (1-based line, 0-based column)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A named, locatable code entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDescriptor {
    /// Bare identifier, always the last dotted component of `qualified_name`
    pub name: String,
    /// Dotted path identifying the symbol within the project
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub definition_location: Location,
    pub enclosing_scope: SymbolScope,
    pub docstring: Option<String>,
}

/// Kind of an extractable element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Lambda,
    Expression,
    Block,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Lambda => "lambda",
            ElementKind::Expression => "expression",
            ElementKind::Block => "block",
        }
    }
}

/// A candidate sub-expression or sub-statement within a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractableElement {
    /// `<qualified_function_name>.<kind>_<ordinal>`
    pub id: String,
    pub kind: ElementKind,
    pub source_text: String,
    pub location: Location,
    pub is_extractable: bool,
}

/// Parameters for symbol analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeParams {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl AnalyzeParams {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            file_path: None,
        }
    }
}

/// Parameters for renaming a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameParams {
    pub symbol: String,
    pub new_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl RenameParams {
    pub fn new(symbol: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            new_name: new_name.into(),
            file_path: None,
        }
    }
}

/// Parameters for extracting an element or a whole function body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractParams {
    /// `<qualified_function_name>.<element_id>` or a qualified function name
    pub source: String,
    pub new_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl ExtractParams {
    pub fn new(source: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            new_name: new_name.into(),
            file_path: None,
        }
    }
}

/// Parameters for finding symbols by pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindParams {
    /// Substring or `*`/`?` glob, matched case-insensitively
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl FindParams {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            file_path: None,
        }
    }
}

/// Parameters for listing the extractable elements of a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowParams {
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl ShowParams {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            file_path: None,
        }
    }
}

/// One tagged variant per operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationParameters {
    Analyze(AnalyzeParams),
    Rename(RenameParams),
    Extract(ExtractParams),
    Find(FindParams),
    Show(ShowParams),
}

impl OperationParameters {
    /// Capability this request needs
    pub fn operation(&self) -> Operation {
        match self {
            OperationParameters::Analyze(_) => Operation::AnalyzeSymbol,
            OperationParameters::Rename(_) => Operation::RenameSymbol,
            OperationParameters::Extract(_) => Operation::ExtractElement,
            OperationParameters::Find(_) => Operation::FindSymbols,
            OperationParameters::Show(_) => Operation::ShowFunction,
        }
    }

    /// File path declared by the caller, if any
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            OperationParameters::Analyze(p) => p.file_path.as_deref(),
            OperationParameters::Rename(p) => p.file_path.as_deref(),
            OperationParameters::Extract(p) => p.file_path.as_deref(),
            OperationParameters::Find(p) => p.file_path.as_deref(),
            OperationParameters::Show(p) => p.file_path.as_deref(),
        }
    }

    /// Symbol, source reference, pattern or function name the request targets
    pub fn target(&self) -> &str {
        match self {
            OperationParameters::Analyze(p) => &p.symbol,
            OperationParameters::Rename(p) => &p.symbol,
            OperationParameters::Extract(p) => &p.source,
            OperationParameters::Find(p) => &p.pattern,
            OperationParameters::Show(p) => &p.function_name,
        }
    }

    /// Proposed name for rename and extract requests
    pub fn new_name(&self) -> Option<&str> {
        match self {
            OperationParameters::Rename(p) => Some(&p.new_name),
            OperationParameters::Extract(p) => Some(&p.new_name),
            _ => None,
        }
    }
}

impl From<AnalyzeParams> for OperationParameters {
    fn from(params: AnalyzeParams) -> Self {
        OperationParameters::Analyze(params)
    }
}

impl From<RenameParams> for OperationParameters {
    fn from(params: RenameParams) -> Self {
        OperationParameters::Rename(params)
    }
}

impl From<ExtractParams> for OperationParameters {
    fn from(params: ExtractParams) -> Self {
        OperationParameters::Extract(params)
    }
}

impl From<FindParams> for OperationParameters {
    fn from(params: FindParams) -> Self {
        OperationParameters::Find(params)
    }
}

impl From<ShowParams> for OperationParameters {
    fn from(params: ShowParams) -> Self {
        OperationParameters::Show(params)
    }
}

/// Why an operation failed, with remediation hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    pub error_kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl OperationFailure {
    pub fn new(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error_kind,
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    pub fn validation(field: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::ValidationFailed,
            format!("Validation failed for {}: {}", field, reason),
        )
        .with_suggestions(["Check parameter format and constraints"])
    }

    pub fn symbol_not_found(symbol: &str, similar: &[String]) -> Self {
        let mut failure = Self::new(
            ErrorKind::SymbolNotFound,
            format!("Symbol '{}' not found", symbol),
        );
        if !similar.is_empty() {
            failure.suggestions.push(format!("Did you mean: {}", similar.join(", ")));
        }
        failure.with_suggestions([
            "Check symbol name spelling",
            "Use 'find_symbols' to discover available symbols",
            "Ensure the symbol is in the correct file/module",
        ])
    }

    pub fn function_not_found(function: &str, similar: &[String]) -> Self {
        let mut failure = Self::new(
            ErrorKind::FunctionNotFound,
            format!("Function '{}' not found", function),
        );
        if !similar.is_empty() {
            failure.suggestions.push(format!("Did you mean: {}", similar.join(", ")));
        }
        failure.with_suggestions([
            "Ensure the function exists and use qualified names like 'module.function'",
        ])
    }

    pub fn ambiguous(symbol: &str, candidates: &[String]) -> Self {
        Self::new(
            ErrorKind::AmbiguousSymbol,
            format!("Multiple '{}' symbols found", symbol),
        )
        .with_suggestions([
            format!("Use qualified names: {}", candidates.join(", ")),
            "Run 'find_symbols' to see all matches".to_string(),
        ])
    }

    pub fn naming_conflict(new_name: &str) -> Self {
        Self::new(
            ErrorKind::NamingConflict,
            format!("Name '{}' would conflict with an existing definition", new_name),
        )
        .with_suggestions([
            "Choose a different name to avoid conflicts",
            "Resolve existing conflicts before proceeding",
        ])
    }

    pub fn unsupported_language(language: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::UnsupportedLanguage,
            format!("No provider available for language: {}", language),
        )
        .with_suggestions([
            "Check if the file extension is supported",
            "Register a provider for this language",
        ])
    }

    pub fn operation_unsupported(language: impl fmt::Display, operation: Operation) -> Self {
        Self::new(
            ErrorKind::OperationUnsupported,
            format!("No provider for {} supports {}", language, operation),
        )
        .with_suggestions(["Register a provider advertising this capability"])
    }
}

/// Common accessors over every operation result
pub trait OperationOutcome {
    fn success(&self) -> bool;

    fn failure(&self) -> Option<&OperationFailure>;

    fn error_kind(&self) -> Option<ErrorKind> {
        self.failure().map(|f| f.error_kind)
    }
}

macro_rules! impl_outcome {
    ($($result:ty),+ $(,)?) => {
        $(
            impl $result {
                /// Failed result; success-only fields stay at their defaults
                pub fn failed(failure: OperationFailure) -> Self {
                    Self {
                        success: false,
                        error: Some(failure),
                        ..Default::default()
                    }
                }
            }

            impl OperationOutcome for $result {
                fn success(&self) -> bool {
                    self.success
                }

                fn failure(&self) -> Option<&OperationFailure> {
                    self.error.as_ref()
                }
            }
        )+
    };
}

/// Result of symbol analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub symbol_info: Option<SymbolDescriptor>,
    #[serde(default)]
    pub references: Vec<Location>,
    #[serde(default)]
    pub reference_count: usize,
    #[serde(default)]
    pub refactoring_suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationFailure>,
}

impl AnalysisResult {
    pub fn found(
        symbol: SymbolDescriptor,
        references: Vec<Location>,
        refactoring_suggestions: Vec<String>,
    ) -> Self {
        Self {
            success: true,
            symbol_info: Some(symbol),
            reference_count: references.len(),
            references,
            refactoring_suggestions,
            error: None,
        }
    }
}

/// Result of a pattern search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindResult {
    pub success: bool,
    pub pattern: Option<String>,
    #[serde(default)]
    pub matches: Vec<SymbolDescriptor>,
    /// Uncapped number of matches
    #[serde(default)]
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationFailure>,
}

/// Result of a rename
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameResult {
    pub success: bool,
    pub old_name: Option<String>,
    pub new_name: Option<String>,
    pub qualified_name: Option<String>,
    #[serde(default)]
    pub files_modified: Vec<PathBuf>,
    #[serde(default)]
    pub references_updated: usize,
    /// Locations of existing definitions that block the rename
    #[serde(default)]
    pub conflicts: Vec<String>,
    pub backup_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationFailure>,
}

/// Result of an extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractResult {
    pub success: bool,
    pub source: Option<String>,
    pub new_function_name: Option<String>,
    pub extracted_code: Option<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub files_modified: Vec<PathBuf>,
    pub backup_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationFailure>,
}

/// Result of listing extractable elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowResult {
    pub success: bool,
    pub function_name: Option<String>,
    #[serde(default)]
    pub extractable_elements: Vec<ExtractableElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationFailure>,
}

impl_outcome!(AnalysisResult, FindResult, RenameResult, ExtractResult, ShowResult);

/// One tagged variant per operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationResult {
    Analyze(AnalysisResult),
    Find(FindResult),
    Rename(RenameResult),
    Extract(ExtractResult),
    Show(ShowResult),
}

impl OperationResult {
    /// Failed result of the variant matching `operation`
    pub fn failed(operation: Operation, failure: OperationFailure) -> Self {
        match operation {
            Operation::AnalyzeSymbol => OperationResult::Analyze(AnalysisResult::failed(failure)),
            Operation::FindSymbols => OperationResult::Find(FindResult::failed(failure)),
            Operation::RenameSymbol => OperationResult::Rename(RenameResult::failed(failure)),
            Operation::ExtractElement => OperationResult::Extract(ExtractResult::failed(failure)),
            Operation::ShowFunction => OperationResult::Show(ShowResult::failed(failure)),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            OperationResult::Analyze(_) => Operation::AnalyzeSymbol,
            OperationResult::Find(_) => Operation::FindSymbols,
            OperationResult::Rename(_) => Operation::RenameSymbol,
            OperationResult::Extract(_) => Operation::ExtractElement,
            OperationResult::Show(_) => Operation::ShowFunction,
        }
    }

    fn outcome(&self) -> &dyn OperationOutcome {
        match self {
            OperationResult::Analyze(r) => r,
            OperationResult::Find(r) => r,
            OperationResult::Rename(r) => r,
            OperationResult::Extract(r) => r,
            OperationResult::Show(r) => r,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome().success()
    }

    pub fn failure(&self) -> Option<&OperationFailure> {
        self.outcome().failure()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.outcome().error_kind()
    }

    /// Record the backup that covered a destructive operation
    pub fn set_backup_id(&mut self, backup_id: impl Into<String>) {
        match self {
            OperationResult::Rename(r) => r.backup_id = Some(backup_id.into()),
            OperationResult::Extract(r) => r.backup_id = Some(backup_id.into()),
            _ => {}
        }
    }
}
