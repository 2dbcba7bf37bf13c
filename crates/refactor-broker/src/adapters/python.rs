//! Python refactoring provider backed by tree-sitter
//!
//! Renames rewrite the occurrences bound to the resolved definition: the
//! defining scope, the modules importing a module-level name, and attribute
//! access for class members. Extraction turns a lambda into a module-level
//! function, or moves a whole function body into a new function the original
//! delegates to.

use std::fs;
use std::path::PathBuf;

use glob::{MatchOptions, Pattern};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, info};
use tree_sitter::Node;

use super::edits::{apply_edits, reindent, TextEdit};
use crate::config::{AnalysisConfig, BrokerConfig, FindConfig};
use crate::error::Result;
use crate::language::Language;
use crate::providers::RefactoringProvider;
use crate::resolver::bindings::BoundOccurrences;
use crate::resolver::syntax::{top_level_statement, Definition, ParsedModule};
use crate::resolver::{element_sites, ElementSite, Resolution, SymbolResolver};
use crate::types::{
    AnalysisResult, AnalyzeParams, ErrorKind, ExtractParams, ExtractResult, FindParams,
    FindResult, Operation, OperationFailure, OperationParameters, RenameParams, RenameResult,
    ShowParams, ShowResult, SymbolDescriptor,
};

/// Reserved words that can never be used as a new name
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

static ELEMENT_ID: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(lambda|expression|block)_\d+$").unwrap()
});

const SIMILAR_NAME_LIMIT: usize = 3;

/// A resolved definition with its parsed module
struct Located {
    descriptor: SymbolDescriptor,
    definition: Definition,
    module: ParsedModule,
}

enum Lookup {
    Found(Box<Located>),
    NotFound,
    Ambiguous(Vec<String>),
}

/// Python provider using tree-sitter syntax trees
pub struct PythonAstProvider {
    resolver: SymbolResolver,
    strict_qualified_names: bool,
    find: FindConfig,
    analysis: AnalysisConfig,
    write_lock: Mutex<()>,
}

impl PythonAstProvider {
    pub const NAME: &'static str = "python-ast";

    /// Create a provider for the project at `root` with default settings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, &BrokerConfig::default())
    }

    /// Create a provider for the project at `root`
    pub fn with_config(root: impl Into<PathBuf>, config: &BrokerConfig) -> Self {
        Self {
            resolver: SymbolResolver::new(root)
                .with_excluded_dirs(config.resolver.excluded_dirs.clone()),
            strict_qualified_names: config.resolver.strict_qualified_names,
            find: config.find.clone(),
            analysis: config.analysis.clone(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn resolver(&self) -> &SymbolResolver {
        &self.resolver
    }

    fn lookup(&self, files: &[PathBuf], raw_symbol: &str) -> Result<Lookup> {
        // A cached descriptor can outlive an edit made behind our back; retry once uncached
        for _ in 0..2 {
            let descriptor = if self.strict_qualified_names {
                match self.resolver.resolve_unique(files, raw_symbol) {
                    Resolution::Found(descriptor) => descriptor,
                    Resolution::NotFound => return Ok(Lookup::NotFound),
                    Resolution::Ambiguous(candidates) => {
                        return Ok(Lookup::Ambiguous(
                            candidates.into_iter().map(|c| c.qualified_name).collect(),
                        ))
                    }
                }
            } else {
                match self.resolver.resolve(files, raw_symbol) {
                    Some(descriptor) => descriptor,
                    None => return Ok(Lookup::NotFound),
                }
            };

            let module =
                ParsedModule::load(&descriptor.definition_location.file, self.resolver.root())?;
            let definition = module
                .definitions()
                .into_iter()
                .find(|d| d.matches(&descriptor));
            if let Some(definition) = definition {
                return Ok(Lookup::Found(Box::new(Located {
                    descriptor,
                    definition,
                    module,
                })));
            }

            debug!(symbol = raw_symbol, "Cached descriptor is stale");
            self.resolver.clear_cache();
        }
        Ok(Lookup::NotFound)
    }

    fn suggestions(&self, definition: &Definition, reference_count: usize) -> Vec<String> {
        let mut suggestions = Vec::new();
        if definition.kind.is_callable() {
            if definition.line_count > self.analysis.long_function_lines {
                suggestions.push(format!(
                    "Function is long ({} lines), consider extracting methods",
                    definition.line_count
                ));
            }
            if definition.parameter_count > self.analysis.max_parameters {
                suggestions.push(format!(
                    "Function takes {} parameters, consider grouping them into an object",
                    definition.parameter_count
                ));
            }
        }
        let is_dunder = definition.name.starts_with("__") && definition.name.ends_with("__");
        if reference_count == 0 && !is_dunder {
            suggestions.push("No references found, symbol may be unused".to_string());
        }
        suggestions
    }

    fn conflicts_in(module: &ParsedModule, new_name: &str) -> Vec<String> {
        module
            .definitions()
            .into_iter()
            .filter(|d| d.name == new_name)
            .map(|d| format!("Name '{}' already exists in {}", new_name, d.location))
            .collect()
    }

    fn not_found_failure(
        &self,
        files: &[PathBuf],
        raw_symbol: &str,
        kind: ErrorKind,
    ) -> OperationFailure {
        let similar = self
            .resolver
            .similar_names(files, raw_symbol, SIMILAR_NAME_LIMIT);
        match kind {
            ErrorKind::FunctionNotFound => {
                OperationFailure::function_not_found(raw_symbol, &similar)
            }
            _ => OperationFailure::symbol_not_found(raw_symbol, &similar),
        }
    }

    /// A callable whose own name looks like an element id, such as `calc.lambda_1`
    fn function_named_like_element(
        &self,
        files: &[PathBuf],
        source: &str,
    ) -> Result<Option<Box<Located>>> {
        let suffix = format!(".{}", source);
        Ok(match self.lookup(files, source)? {
            Lookup::Found(located)
                if located.descriptor.kind.is_callable()
                    && (located.descriptor.qualified_name == source
                        || located.descriptor.qualified_name.ends_with(&suffix)) =>
            {
                Some(located)
            }
            _ => None,
        })
    }

    fn rename(&self, params: &RenameParams) -> Result<RenameResult> {
        if PYTHON_KEYWORDS.contains(&params.new_name.as_str()) {
            return Ok(RenameResult::failed(OperationFailure::validation(
                "new_name",
                format!("'{}' is a reserved word", params.new_name),
            )));
        }

        let files = self.resolver.project_files();
        let located = match self.lookup(&files, &params.symbol)? {
            Lookup::Found(located) => located,
            Lookup::NotFound => {
                return Ok(RenameResult::failed(self.not_found_failure(
                    &files,
                    &params.symbol,
                    ErrorKind::SymbolNotFound,
                )))
            }
            Lookup::Ambiguous(candidates) => {
                return Ok(RenameResult::failed(OperationFailure::ambiguous(
                    &params.symbol,
                    &candidates,
                )))
            }
        };
        let old_name = located.descriptor.name.clone();

        let affected = self.resolver.bound_occurrences(&files, &located.definition);
        if affected.is_empty() {
            return Ok(RenameResult::failed(self.not_found_failure(
                &files,
                &params.symbol,
                ErrorKind::SymbolNotFound,
            )));
        }
        let conflicts = rename_conflicts(&affected, &located.definition, &params.new_name);
        if !conflicts.is_empty() {
            info!(
                symbol = %params.symbol,
                new_name = %params.new_name,
                conflicts = conflicts.len(),
                "Rename blocked by naming conflict"
            );
            let mut result =
                RenameResult::failed(OperationFailure::naming_conflict(&params.new_name));
            result.conflicts = conflicts;
            return Ok(result);
        }

        let mut files_modified = Vec::with_capacity(affected.len());
        let mut references_updated = 0;
        for occurrences in affected {
            let edits = occurrences
                .ranges
                .iter()
                .map(|&(start, end)| TextEdit::replace(start, end, params.new_name.as_str()))
                .collect();
            let rewritten = apply_edits(&occurrences.module.source, edits);
            fs::write(&occurrences.module.path, rewritten)?;

            references_updated += occurrences.ranges.len();
            debug!(
                file = %occurrences.module.path.display(),
                count = occurrences.ranges.len(),
                "Renamed occurrences"
            );
            files_modified.push(occurrences.module.path);
        }
        self.resolver.clear_cache();

        info!(
            old_name = %old_name,
            new_name = %params.new_name,
            files = files_modified.len(),
            references_updated,
            "Renamed symbol"
        );
        Ok(RenameResult {
            success: true,
            old_name: Some(params.symbol.clone()),
            new_name: Some(params.new_name.clone()),
            qualified_name: Some(located.descriptor.qualified_name.clone()),
            files_modified,
            references_updated,
            ..Default::default()
        })
    }

    fn extract(&self, params: &ExtractParams) -> Result<ExtractResult> {
        let Some(source_ref) = SourceRef::parse(&params.source) else {
            return Ok(ExtractResult::failed(
                OperationFailure::new(
                    ErrorKind::InvalidSource,
                    format!("Cannot parse source: {}", params.source),
                )
                .with_suggestions([
                    "Use '<module>.<function>' or '<module>.<function>.<element_id>'",
                    "Run 'show_function' to list element ids",
                ]),
            ));
        };

        let files = self.resolver.project_files();
        let function = match self.lookup(&files, &source_ref.function)? {
            Lookup::Found(located) if located.descriptor.kind.is_callable() => Some(located),
            Lookup::Ambiguous(candidates) => {
                return Ok(ExtractResult::failed(OperationFailure::ambiguous(
                    &source_ref.function,
                    &candidates,
                )))
            }
            _ => None,
        };

        let (located, site) = match (function, &source_ref.element) {
            (Some(located), None) => (located, None),
            (function, Some(element)) => {
                let site = function.as_ref().and_then(|located| {
                    let element_id = format!("{}.{}", located.descriptor.qualified_name, element);
                    element_sites(&located.module, &located.descriptor)
                        .into_iter()
                        .find(|site| site.element.id == element_id)
                });
                match (function, site) {
                    (Some(located), Some(site)) => (located, Some(site)),
                    // A function of its own may be named like an element id
                    (function, None) => {
                        match self.function_named_like_element(&files, &params.source)? {
                            Some(whole) => (whole, None),
                            None => {
                                return Ok(ExtractResult::failed(match function {
                                    Some(located) => OperationFailure::new(
                                        ErrorKind::ResourceNotFound,
                                        format!(
                                            "Element '{}.{}' not found",
                                            located.descriptor.qualified_name, element
                                        ),
                                    )
                                    .with_suggestions(["Run 'show_function' to list element ids"]),
                                    None => function_missing(&source_ref.function),
                                }))
                            }
                        }
                    }
                    (None, Some(_)) => {
                        return Ok(ExtractResult::failed(function_missing(&source_ref.function)))
                    }
                }
            }
            (None, None) => {
                return Ok(ExtractResult::failed(function_missing(&source_ref.function)))
            }
        };

        let conflicts = Self::conflicts_in(&located.module, &params.new_name);
        if !conflicts.is_empty() {
            let mut failure = OperationFailure::naming_conflict(&params.new_name);
            failure.suggestions.extend(conflicts);
            return Ok(ExtractResult::failed(failure));
        }

        let extraction = match site {
            Some(site) => extract_lambda(&located, &site, &params.new_name),
            None => extract_body(&located, &params.new_name),
        };
        let Some(extraction) = extraction else {
            return Ok(ExtractResult::failed(OperationFailure::new(
                ErrorKind::ResourceNotFound,
                format!("Cannot locate the body of {}", located.descriptor.qualified_name),
            )));
        };

        let rewritten = apply_edits(&located.module.source, extraction.edits);
        fs::write(&located.module.path, rewritten)?;
        self.resolver.clear_cache();

        info!(
            source = %params.source,
            new_name = %params.new_name,
            file = %located.module.path.display(),
            "Extracted element"
        );
        Ok(ExtractResult {
            success: true,
            source: Some(params.source.clone()),
            new_function_name: Some(params.new_name.clone()),
            extracted_code: Some(extraction.code),
            parameters: extraction.parameters,
            files_modified: vec![located.module.path.clone()],
            ..Default::default()
        })
    }
}

/// Parsed extraction source reference
#[derive(Debug, PartialEq, Eq)]
struct SourceRef {
    function: String,
    element: Option<String>,
}

impl SourceRef {
    /// `<function>.<kind>_<n>` names an element, any other dotted name a whole function
    fn parse(source: &str) -> Option<Self> {
        let parts: Vec<&str> = source.split('.').collect();
        if parts.len() < 2 || parts.iter().any(|p| p.trim().is_empty()) {
            return None;
        }

        let (last, prefix) = parts.split_last()?;
        if ELEMENT_ID.is_match(last) {
            Some(Self {
                function: prefix.join("."),
                element: Some(last.to_string()),
            })
        } else {
            Some(Self {
                function: source.to_string(),
                element: None,
            })
        }
    }
}

fn function_missing(function: &str) -> OperationFailure {
    OperationFailure::new(
        ErrorKind::ResourceNotFound,
        format!("Cannot find function: {}", function),
    )
    .with_suggestions(["Use 'find_symbols' to discover available functions"])
}

fn parent_of(qualified_name: &str) -> &str {
    qualified_name
        .rsplit_once('.')
        .map_or("", |(parent, _)| parent)
}

/// Definitions that `new_name` would collide with where the renamed binding lives
///
/// That is the defining scope itself, plus module level in files importing
/// the name unaliased.
fn rename_conflicts(
    affected: &[BoundOccurrences],
    definition: &Definition,
    new_name: &str,
) -> Vec<String> {
    let mut conflicts = Vec::new();
    for occurrences in affected.iter().filter(|o| o.binds_name) {
        let module = &occurrences.module;
        let scope = if module.path == definition.location.file {
            parent_of(&definition.qualified_name)
        } else {
            module.module_name.as_str()
        };
        conflicts.extend(
            module
                .definitions()
                .into_iter()
                .filter(|d| d.name == new_name && parent_of(&d.qualified_name) == scope)
                .map(|d| format!("Name '{}' already exists in {}", new_name, d.location)),
        );
    }
    conflicts
}

struct Extraction {
    edits: Vec<TextEdit>,
    code: String,
    parameters: Vec<String>,
}

fn function_node<'a>(located: &'a Located) -> Option<Node<'a>> {
    located
        .module
        .definition_node(&located.definition)
        .filter(|n| n.kind() == "function_definition")
}

/// Replace a lambda with a module-level function inserted before its top-level statement
fn extract_lambda(located: &Located, site: &ElementSite, new_name: &str) -> Option<Extraction> {
    let function = function_node(located)?;
    let anchor = top_level_statement(function);

    let lambda_node = located
        .module
        .tree
        .root_node()
        .descendant_for_byte_range(site.start_byte, site.end_byte)?;
    let parameter_text = lambda_node
        .child_by_field_name("parameters")
        .map(|p| located.module.text(p))
        .unwrap_or("");

    let code = format!("def {}({}):\n    return {}", new_name, parameter_text, site.body);
    Some(Extraction {
        edits: vec![
            TextEdit::insert(anchor.start_byte(), format!("{}\n\n\n", code)),
            TextEdit::replace(site.start_byte, site.end_byte, new_name),
        ],
        code,
        parameters: site.parameters.clone(),
    })
}

/// Move a function body into a new module-level function and delegate to it
fn extract_body(located: &Located, new_name: &str) -> Option<Extraction> {
    let module = &located.module;
    let function = function_node(located)?;
    let body = function.child_by_field_name("body")?;
    let parameters = function.child_by_field_name("parameters")?;
    let anchor = top_level_statement(function);

    let is_async = function.child(0).is_some_and(|c| c.kind() == "async");
    let (arguments, names) = call_arguments(module, parameters);

    let code = format!(
        "{}def {}{}:\n{}",
        if is_async { "async " } else { "" },
        new_name,
        module.text(parameters),
        reindent(module.text(body), body.start_position().column, "    ")
    );
    let call = format!(
        "return {}{}({})",
        if is_async { "await " } else { "" },
        new_name,
        arguments.join(", ")
    );

    Some(Extraction {
        edits: vec![
            TextEdit::insert(anchor.end_byte(), format!("\n\n\n{}", code)),
            TextEdit::replace(body.start_byte(), body.end_byte(), call),
        ],
        code,
        parameters: names,
    })
}

/// Call arguments forwarding every parameter, plus the bare parameter names
fn call_arguments(module: &ParsedModule, parameters: Node<'_>) -> (Vec<String>, Vec<String>) {
    let mut arguments = Vec::new();
    let mut names = Vec::new();
    let mut keyword_only = false;

    let mut cursor = parameters.walk();
    for param in parameters.named_children(&mut cursor) {
        let splat = match param.kind() {
            "keyword_separator" => {
                keyword_only = true;
                continue;
            }
            "positional_separator" => continue,
            "list_splat_pattern" => "*",
            "dictionary_splat_pattern" => "**",
            "typed_parameter" => match param.named_child(0).map(|c| c.kind()) {
                Some("list_splat_pattern") => "*",
                Some("dictionary_splat_pattern") => "**",
                _ => "",
            },
            _ => "",
        };
        let name = match param.kind() {
            "typed_parameter" if !splat.is_empty() => param
                .named_child(0)
                .and_then(|inner| module.parameter_name(inner)),
            _ => module.parameter_name(param),
        };
        let Some(name) = name else {
            continue;
        };

        if splat == "*" {
            keyword_only = true;
        }
        arguments.push(if !splat.is_empty() {
            format!("{}{}", splat, name)
        } else if keyword_only {
            format!("{}={}", name, name)
        } else {
            name.clone()
        });
        names.push(name);
    }
    (arguments, names)
}

impl RefactoringProvider for PythonAstProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_language(&self, language: Language) -> bool {
        language == Language::Python
    }

    fn capabilities(&self, language: Language) -> Vec<Operation> {
        if self.supports_language(language) {
            Operation::ALL.to_vec()
        } else {
            Vec::new()
        }
    }

    fn analyze_symbol(&self, params: &AnalyzeParams) -> Result<AnalysisResult> {
        let files = self.resolver.project_files();
        match self.lookup(&files, &params.symbol)? {
            Lookup::Found(located) => {
                let references = self.resolver.find_references(&files, &located.descriptor);
                let suggestions = self.suggestions(&located.definition, references.len());
                Ok(AnalysisResult::found(located.descriptor, references, suggestions))
            }
            Lookup::NotFound => Ok(AnalysisResult::failed(self.not_found_failure(
                &files,
                &params.symbol,
                ErrorKind::SymbolNotFound,
            ))),
            Lookup::Ambiguous(candidates) => Ok(AnalysisResult::failed(
                OperationFailure::ambiguous(&params.symbol, &candidates),
            )),
        }
    }

    fn find_symbols(&self, params: &FindParams) -> Result<FindResult> {
        let pattern = params.pattern.to_lowercase();
        let glob = if pattern.contains('*') || pattern.contains('?') {
            match Pattern::new(&pattern) {
                Ok(glob) => Some(glob),
                Err(e) => {
                    return Ok(FindResult::failed(OperationFailure::validation(
                        "pattern",
                        format!("invalid glob '{}': {}", params.pattern, e),
                    )))
                }
            }
        } else {
            None
        };
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };

        let files = self.resolver.project_files();
        let mut matches: Vec<SymbolDescriptor> = self
            .resolver
            .definitions(&files)
            .into_iter()
            .filter(|d| {
                let name = d.name.to_lowercase();
                match &glob {
                    Some(glob) => glob.matches_with(&name, options),
                    None => name.contains(&pattern),
                }
            })
            .collect();

        let total_count = matches.len();
        matches.truncate(self.find.max_results);
        debug!(pattern = %params.pattern, total_count, "Found symbols");

        Ok(FindResult {
            success: true,
            pattern: Some(params.pattern.clone()),
            matches,
            total_count,
            error: None,
        })
    }

    fn rename_symbol(&self, params: &RenameParams) -> Result<RenameResult> {
        let _write = self.write_lock.lock();
        self.rename(params)
    }

    fn extract_element(&self, params: &ExtractParams) -> Result<ExtractResult> {
        let _write = self.write_lock.lock();
        self.extract(params)
    }

    fn show_function(&self, params: &ShowParams) -> Result<ShowResult> {
        let files = self.resolver.project_files();
        let descriptor = match self.lookup(&files, &params.function_name)? {
            Lookup::Found(located) if located.descriptor.kind.is_callable() => located.descriptor,
            Lookup::Ambiguous(candidates) => {
                return Ok(ShowResult::failed(OperationFailure::ambiguous(
                    &params.function_name,
                    &candidates,
                )))
            }
            _ => {
                return Ok(ShowResult::failed(self.not_found_failure(
                    &files,
                    &params.function_name,
                    ErrorKind::FunctionNotFound,
                )))
            }
        };

        let extractable_elements = self.resolver.find_extractable_elements(&descriptor);
        Ok(ShowResult {
            success: true,
            function_name: Some(params.function_name.clone()),
            extractable_elements,
            error: None,
        })
    }

    fn affected_files(&self, params: &OperationParameters) -> Result<Vec<PathBuf>> {
        let files = self.resolver.project_files();
        let affected = match params {
            OperationParameters::Rename(rename) => match self.lookup(&files, &rename.symbol)? {
                Lookup::Found(located) => self
                    .resolver
                    .bound_occurrences(&files, &located.definition)
                    .into_iter()
                    .map(|o| o.module.path)
                    .collect(),
                _ => Vec::new(),
            },
            OperationParameters::Extract(extract) => match SourceRef::parse(&extract.source) {
                Some(source_ref) => match self.lookup(&files, &source_ref.function)? {
                    Lookup::Found(located) => vec![located.module.path.clone()],
                    _ => self
                        .function_named_like_element(&files, &extract.source)?
                        .map(|located| vec![located.module.path.clone()])
                        .unwrap_or_default(),
                },
                None => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OperationOutcome;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> std::io::Result<TempDir> {
        let dir = TempDir::new()?;
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(full, content)?;
        }
        Ok(dir)
    }

    #[test]
    fn test_source_ref_parsing() {
        assert_eq!(SourceRef::parse("calc"), None);
        assert_eq!(SourceRef::parse("calc..lambda_1"), None);
        assert_eq!(
            SourceRef::parse("app.calc.lambda_2"),
            Some(SourceRef {
                function: "app.calc".to_string(),
                element: Some("lambda_2".to_string()),
            })
        );
        assert_eq!(
            SourceRef::parse("app.calc"),
            Some(SourceRef {
                function: "app.calc".to_string(),
                element: None,
            })
        );
    }

    #[test]
    fn test_rename_rejects_keyword() -> Result<()> {
        let dir = project(&[("a.py", "def run():\n    pass\n")])?;
        let provider = PythonAstProvider::new(dir.path());

        let result = provider.rename_symbol(&RenameParams::new("run", "class"))?;
        assert_eq!(result.error_kind(), Some(ErrorKind::ValidationFailed));
        Ok(())
    }

    #[test]
    fn test_extract_lambda() -> Result<()> {
        let source = "def transform(items):\n    return list(map(lambda x: x * 2, items))\n";
        let dir = project(&[("calc.py", source)])?;
        let provider = PythonAstProvider::new(dir.path());

        let params = ExtractParams::new("calc.transform.lambda_1", "double");
        let result = provider.extract_element(&params)?;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.parameters, vec!["x"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("calc.py"))?,
            "def double(x):\n    return x * 2\n\n\n\
             def transform(items):\n    return list(map(double, items))\n"
        );
        Ok(())
    }

    #[test]
    fn test_extract_second_lambda() -> Result<()> {
        let source = "def f(xs):\n    a = map(lambda x: x + 1, xs)\n    return sorted(a, key=lambda y: -y)\n";
        let dir = project(&[("m.py", source)])?;
        let provider = PythonAstProvider::new(dir.path());

        let shown = provider.show_function(&ShowParams::new("f"))?;
        assert_eq!(shown.extractable_elements.len(), 2);
        assert_eq!(shown.extractable_elements[1].source_text, "lambda y: -y");

        let result = provider.extract_element(&ExtractParams::new("m.f.lambda_2", "neg"))?;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.parameters, vec!["y"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("m.py"))?,
            "def neg(y):\n    return -y\n\n\n\
             def f(xs):\n    a = map(lambda x: x + 1, xs)\n    return sorted(a, key=neg)\n"
        );
        Ok(())
    }

    #[test]
    fn test_extract_function_named_like_element() -> Result<()> {
        let dir = project(&[("calc.py", "def lambda_1(x):\n    return x + 1\n")])?;
        let provider = PythonAstProvider::new(dir.path());

        let affected = provider.affected_files(&ExtractParams::new("calc.lambda_1", "inc").into())?;
        assert_eq!(affected, vec![dir.path().join("calc.py")]);

        let result = provider.extract_element(&ExtractParams::new("calc.lambda_1", "increment"))?;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.parameters, vec!["x"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("calc.py"))?,
            "def lambda_1(x):\n    return increment(x)\n\n\ndef increment(x):\n    return x + 1\n"
        );
        Ok(())
    }

    #[test]
    fn test_extract_whole_function_body() -> Result<()> {
        let source = "def total(a, b=1, *rest, scale, **opts):\n    s = a + b\n    return s * scale\n";
        let dir = project(&[("calc.py", source)])?;
        let provider = PythonAstProvider::new(dir.path());

        let params = ExtractParams::new("calc.total", "compute_total");
        let result = provider.extract_element(&params)?;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.parameters, vec!["a", "b", "rest", "scale", "opts"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("calc.py"))?,
            "def total(a, b=1, *rest, scale, **opts):\n    \
             return compute_total(a, b, *rest, scale=scale, **opts)\n\n\n\
             def compute_total(a, b=1, *rest, scale, **opts):\n    s = a + b\n    return s * scale\n"
        );
        Ok(())
    }

    #[test]
    fn test_extract_unknown_element() -> Result<()> {
        let dir = project(&[("calc.py", "def f():\n    return 1\n")])?;
        let provider = PythonAstProvider::new(dir.path());

        let missing_element =
            provider.extract_element(&ExtractParams::new("calc.f.lambda_1", "g"))?;
        assert_eq!(missing_element.error_kind(), Some(ErrorKind::ResourceNotFound));

        let missing_function = provider.extract_element(&ExtractParams::new("calc.nothing", "g"))?;
        assert_eq!(missing_function.error_kind(), Some(ErrorKind::ResourceNotFound));

        let bad_source = provider.extract_element(&ExtractParams::new("f", "g"))?;
        assert_eq!(bad_source.error_kind(), Some(ErrorKind::InvalidSource));
        Ok(())
    }

    #[test]
    fn test_analysis_suggestions() -> Result<()> {
        let mut source = String::from("def busy(a, b, c, d, e, f):\n");
        for i in 0..20 {
            source.push_str(&format!("    v{} = {}\n", i, i));
        }
        let dir = project(&[("busy.py", source.as_str())])?;
        let provider = PythonAstProvider::new(dir.path());

        let result = provider.analyze_symbol(&AnalyzeParams::new("busy"))?;
        assert!(result.success);
        assert_eq!(result.reference_count, 0);
        assert_eq!(result.refactoring_suggestions.len(), 3);
        assert!(result.refactoring_suggestions[0].starts_with("Function is long"));
        Ok(())
    }

    #[test]
    fn test_affected_files_for_rename() -> Result<()> {
        let dir = project(&[
            ("a.py", "def calc():\n    pass\n"),
            ("b.py", "from a import calc\ncalc()\n"),
            ("c.py", "x = 1\n"),
        ])?;
        let provider = PythonAstProvider::new(dir.path());

        let files = provider.affected_files(&RenameParams::new("calc", "compute").into())?;
        let names: Vec<_> = files
            .iter()
            .filter_map(|f| f.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.py", "b.py"]);
        Ok(())
    }

    #[test]
    fn test_rename_method_leaves_same_named_function() -> Result<()> {
        let module_level = "def helper():\n    return 1\n\n\nprint(helper())\n";
        let dir = project(&[
            ("a.py", module_level),
            ("pkg/__init__.py", ""),
            (
                "pkg/b.py",
                "class Store:\n    def helper(self):\n        return 2\n\n    \
                 def load(self):\n        return self.helper()\n",
            ),
        ])?;
        let provider = PythonAstProvider::new(dir.path());

        let params = RenameParams::new("pkg.b.Store.helper", "fetch");
        let affected = provider.affected_files(&params.clone().into())?;
        assert_eq!(affected, vec![dir.path().join("pkg/b.py")]);

        let result = provider.rename_symbol(&params)?;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.references_updated, 2);
        assert_eq!(fs::read_to_string(dir.path().join("a.py"))?, module_level);
        let store = fs::read_to_string(dir.path().join("pkg/b.py"))?;
        assert!(store.contains("def fetch(self)"));
        assert!(store.contains("return self.fetch()"));
        Ok(())
    }

    #[test]
    fn test_rename_conflicts_only_within_binding_scope() -> Result<()> {
        let dir = project(&[
            ("a.py", "def helper():\n    return 1\n"),
            ("b.py", "from a import helper\n\n\ndef load():\n    return helper()\n"),
            ("c.py", "def helper():\n    return 3\n\n\ndef load():\n    return 0\n"),
        ])?;
        let provider = PythonAstProvider::new(dir.path());

        // b.py imports the name and already defines `load` at module level
        let blocked = provider.rename_symbol(&RenameParams::new("a.helper", "load"))?;
        assert_eq!(blocked.error_kind(), Some(ErrorKind::NamingConflict));
        assert_eq!(blocked.conflicts.len(), 1);
        assert!(blocked.conflicts[0].contains("b.py"));

        // c.py has its own unrelated `helper` and `load`
        let result = provider.rename_symbol(&RenameParams::new("a.helper", "fetch"))?;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.files_modified.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("c.py"))?,
            "def helper():\n    return 3\n\n\ndef load():\n    return 0\n"
        );
        Ok(())
    }
}
