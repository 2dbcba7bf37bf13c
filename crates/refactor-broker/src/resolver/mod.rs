//! Symbol resolution over Python projects
//!
//! The resolver maps a bare or dotted symbol name to the definition that
//! declares it, finds the identifier sites that reference it and lists the
//! extractable elements of a function. Files are visited in path order and
//! each file is walked in pre-order, so results are stable for an unchanged
//! project.

pub(crate) mod bindings;
pub(crate) mod syntax;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::types::{ElementKind, ExtractableElement, Location, SymbolDescriptor};
use syntax::{walk_preorder, Definition, ParsedModule};

/// Directories skipped when listing project files unless configured otherwise
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["__pycache__", "venv", ".venv", "node_modules"];

/// Outcome of a uniqueness-enforcing lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(SymbolDescriptor),
    NotFound,
    /// More than one definition carries the bare name
    Ambiguous(Vec<SymbolDescriptor>),
}

/// A lambda inside a function, with what an extraction needs to rewrite it
#[derive(Debug, Clone)]
pub(crate) struct ElementSite {
    pub element: ExtractableElement,
    pub start_byte: usize,
    pub end_byte: usize,
    pub parameters: Vec<String>,
    pub body: String,
}

/// Resolves symbols within one project root
pub struct SymbolResolver {
    root: PathBuf,
    excluded_dirs: Vec<String>,
    cache: RwLock<HashMap<(PathBuf, String), Arc<SymbolDescriptor>>>,
}

impl SymbolResolver {
    /// Create a resolver rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the excluded directory names
    pub fn with_excluded_dirs(mut self, excluded_dirs: Vec<String>) -> Self {
        self.excluded_dirs = excluded_dirs;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Python source files of the project, sorted by path
    ///
    /// Hidden entries and excluded directories are skipped.
    pub fn project_files(&self) -> Vec<PathBuf> {
        let excluded = &self.excluded_dirs;
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !name.starts_with('.') && !excluded.iter().any(|d| d.as_str() == name)
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "py"))
            .map(|entry| entry.into_path())
            .collect()
    }

    /// Resolve `raw_symbol` to its first matching definition
    ///
    /// A dotted name is first looked up in the file its prefix names; if that
    /// fails, every file is scanned for the trailing component.
    pub fn resolve(&self, files: &[PathBuf], raw_symbol: &str) -> Option<SymbolDescriptor> {
        let key = (self.root.clone(), raw_symbol.to_string());
        if let Some(cached) = self.cache.read().get(&key) {
            debug!(symbol = raw_symbol, "Resolved symbol from cache");
            return Some(cached.as_ref().clone());
        }

        let descriptor = self.resolve_definition(files, raw_symbol)?.descriptor();
        self.cache.write().insert(key, Arc::new(descriptor.clone()));
        Some(descriptor)
    }

    /// Resolve a symbol, reporting every candidate when a bare name is shared
    ///
    /// Dotted names follow [`resolve`](Self::resolve); only bare names are
    /// checked for uniqueness.
    pub fn resolve_unique(&self, files: &[PathBuf], raw_symbol: &str) -> Resolution {
        if raw_symbol.contains('.') {
            return match self.resolve(files, raw_symbol) {
                Some(descriptor) => Resolution::Found(descriptor),
                None => Resolution::NotFound,
            };
        }

        let mut candidates: Vec<SymbolDescriptor> = self
            .definitions(files)
            .into_iter()
            .filter(|d| d.name == raw_symbol)
            .collect();

        match candidates.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found(candidates.remove(0)),
            _ => Resolution::Ambiguous(candidates),
        }
    }

    /// Every function, class, method and top-level variable in `files`
    pub fn definitions(&self, files: &[PathBuf]) -> Vec<SymbolDescriptor> {
        self.raw_definitions(files)
            .iter()
            .map(Definition::descriptor)
            .collect()
    }

    /// Identifier sites naming `descriptor`, excluding its own definition
    ///
    /// Unreadable files are logged and skipped.
    pub fn find_references(
        &self,
        files: &[PathBuf],
        descriptor: &SymbolDescriptor,
    ) -> Vec<Location> {
        let mut references = Vec::new();
        for file in files {
            let module = match self.load(file) {
                Some(module) => module,
                None => continue,
            };
            references.extend(
                module
                    .identifiers(&descriptor.name)
                    .into_iter()
                    .map(|node| module.location(node))
                    .filter(|location| *location != descriptor.definition_location),
            );
        }
        debug!(
            symbol = %descriptor.qualified_name,
            count = references.len(),
            "Found references"
        );
        references
    }

    /// Lambdas in the function described by `descriptor`, in traversal order
    ///
    /// Nested function and class definitions are not entered. Comprehensions
    /// are a different node kind and never counted.
    pub fn find_extractable_elements(
        &self,
        descriptor: &SymbolDescriptor,
    ) -> Vec<ExtractableElement> {
        let Some(module) = self.load(&descriptor.definition_location.file) else {
            return Vec::new();
        };
        element_sites(&module, descriptor)
            .into_iter()
            .map(|site| site.element)
            .collect()
    }

    /// Qualified names that look like `raw_symbol`, closest first
    pub fn similar_names(&self, files: &[PathBuf], raw_symbol: &str, limit: usize) -> Vec<String> {
        let wanted = raw_symbol
            .rsplit('.')
            .next()
            .unwrap_or(raw_symbol)
            .to_lowercase();

        let mut scored: BTreeSet<(usize, String)> = BTreeSet::new();
        for definition in self.raw_definitions(files) {
            let candidate = definition.name.to_lowercase();
            let score = if candidate == wanted {
                Some(0)
            } else if candidate.contains(&wanted) || wanted.contains(&candidate) {
                Some(1)
            } else {
                let distance = strsim::levenshtein(&candidate, &wanted);
                (distance <= 2).then_some(1 + distance)
            };
            if let Some(score) = score {
                scored.insert((score, definition.qualified_name));
            }
        }

        scored.into_iter().take(limit).map(|(_, name)| name).collect()
    }

    /// Drop every cached descriptor
    pub fn clear_cache(&self) {
        self.cache.write().clear();
        debug!(root = %self.root.display(), "Cleared symbol cache");
    }

    /// Parse one file, logging and skipping it on failure
    pub(crate) fn load(&self, file: &Path) -> Option<ParsedModule> {
        match ParsedModule::load(file, &self.root) {
            Ok(module) => Some(module),
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Skipping unreadable source file");
                None
            }
        }
    }

    pub(crate) fn raw_definitions(&self, files: &[PathBuf]) -> Vec<Definition> {
        files
            .iter()
            .filter_map(|file| self.load(file))
            .flat_map(|module| module.definitions())
            .collect()
    }

    /// The raw definition behind `raw_symbol`, bypassing the cache
    pub(crate) fn resolve_definition(
        &self,
        files: &[PathBuf],
        raw_symbol: &str,
    ) -> Option<Definition> {
        let trailing = raw_symbol.rsplit('.').next().unwrap_or(raw_symbol);
        if trailing.is_empty() {
            return None;
        }

        if raw_symbol.contains('.') {
            if let Some(found) = self.resolve_by_module_path(files, raw_symbol, trailing) {
                return Some(found);
            }
        }

        let definitions = self.raw_definitions(files);
        let qualified_suffix = format!(".{}", raw_symbol);
        let found = definitions
            .iter()
            .find(|d| {
                raw_symbol.contains('.')
                    && (d.qualified_name == raw_symbol
                        || d.qualified_name.ends_with(&qualified_suffix))
            })
            .or_else(|| definitions.iter().find(|d| d.name == trailing))
            .cloned();

        match &found {
            Some(d) => debug!(
                symbol = raw_symbol,
                qualified = %d.qualified_name,
                "Resolved symbol"
            ),
            None => debug!(symbol = raw_symbol, "Symbol not found"),
        }
        found
    }

    fn resolve_by_module_path(
        &self,
        files: &[PathBuf],
        raw_symbol: &str,
        trailing: &str,
    ) -> Option<Definition> {
        let parts: Vec<&str> = raw_symbol.split('.').collect();

        for prefix_len in (1..parts.len()).rev() {
            let module_dir: PathBuf = parts[..prefix_len].iter().collect();
            let candidates = [
                self.root.join(module_dir.with_extension("py")),
                self.root.join(&module_dir).join("__init__.py"),
            ];

            for candidate in candidates.iter().filter(|c| files.contains(c)) {
                let Some(module) = self.load(candidate) else {
                    continue;
                };
                let definitions = module.definitions();
                let found = definitions
                    .iter()
                    .find(|d| d.qualified_name == raw_symbol)
                    .or_else(|| definitions.iter().find(|d| d.name == trailing));
                if let Some(found) = found {
                    return Some(found.clone());
                }
            }
        }
        None
    }
}

/// Lambda sites inside the function `descriptor` names within `module`
pub(crate) fn element_sites(
    module: &ParsedModule,
    descriptor: &SymbolDescriptor,
) -> Vec<ElementSite> {
    let Some(definition) = module
        .definitions()
        .into_iter()
        .find(|d| d.matches(descriptor))
    else {
        return Vec::new();
    };
    let Some(function) = module.definition_node(&definition) else {
        return Vec::new();
    };
    if function.kind() != "function_definition" {
        return Vec::new();
    }

    let mut sites = Vec::new();
    walk_preorder(function, |node| {
        if node != function && matches!(node.kind(), "function_definition" | "class_definition") {
            return false;
        }
        // The `lambda` keyword token shares the node kind
        if node.is_named() && node.kind() == "lambda" {
            let ordinal = sites.len() + 1;
            sites.push(ElementSite {
                element: ExtractableElement {
                    id: format!(
                        "{}.{}_{}",
                        descriptor.qualified_name,
                        ElementKind::Lambda.as_str(),
                        ordinal
                    ),
                    kind: ElementKind::Lambda,
                    source_text: module.text(node).to_string(),
                    location: module.location(node),
                    is_extractable: true,
                },
                start_byte: node.start_byte(),
                end_byte: node.end_byte(),
                parameters: node
                    .child_by_field_name("parameters")
                    .map(|p| module.parameter_names(p))
                    .unwrap_or_default(),
                body: node
                    .child_by_field_name("body")
                    .map(|b| module.text(b).to_string())
                    .unwrap_or_default(),
            });
        }
        true
    });
    sites
}
