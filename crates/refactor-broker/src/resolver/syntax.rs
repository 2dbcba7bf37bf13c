//! Python syntax trees and the definition walk

use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

use crate::error::{RefactoringError, Result};
use crate::types::{Location, SymbolDescriptor, SymbolKind, SymbolScope};

/// A parsed Python source file
pub(crate) struct ParsedModule {
    pub path: PathBuf,
    /// Dotted module path relative to the project root
    pub module_name: String,
    pub source: String,
    pub tree: Tree,
}

/// A definition found by the walk, with the byte offsets needed to edit it
#[derive(Debug, Clone)]
pub(crate) struct Definition {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub scope: SymbolScope,
    pub location: Location,
    pub name_start: usize,
    pub docstring: Option<String>,
    pub line_count: usize,
    pub parameter_count: usize,
}

impl Definition {
    pub fn descriptor(&self) -> SymbolDescriptor {
        SymbolDescriptor {
            name: self.name.clone(),
            qualified_name: self.qualified_name.clone(),
            kind: self.kind,
            definition_location: self.location.clone(),
            enclosing_scope: self.scope,
            docstring: self.docstring.clone(),
        }
    }

    /// Whether this definition was produced for `descriptor`
    pub fn matches(&self, descriptor: &SymbolDescriptor) -> bool {
        self.qualified_name == descriptor.qualified_name
            && self.location == descriptor.definition_location
    }
}

struct Frame {
    name: String,
    is_class: bool,
}

/// Parse Python source with tree-sitter
pub(crate) fn parse_python(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    let language = tree_sitter_python::LANGUAGE.into();
    parser
        .set_language(&language)
        .map_err(|e| RefactoringError::Parse(e.to_string()))?;
    parser
        .parse(source, None)
        .ok_or_else(|| RefactoringError::Parse("failed to parse source".into()))
}

/// Dotted module name of `path` relative to `root` (`pkg/mod.py` -> `pkg.mod`)
pub(crate) fn module_name(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts: Vec<String> = relative
        .with_extension("")
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.len() > 1 && parts.last().map(String::as_str) == Some("__init__") {
        parts.pop();
    }
    parts.join(".")
}

/// Names starting with one underscore are private; dunders are not
pub(crate) fn is_private_name(name: &str) -> bool {
    name.starts_with('_') && !(name.starts_with("__") && name.ends_with("__") && name.len() > 4)
}

/// Visit nodes in pre-order; returning `false` skips the node's children
pub(crate) fn walk_preorder<'t, F>(root: Node<'t>, mut visit: F)
where
    F: FnMut(Node<'t>) -> bool,
{
    let mut cursor = root.walk();
    loop {
        let descend = visit(cursor.node());
        if descend && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.node() == root {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

impl ParsedModule {
    pub fn parse(path: &Path, root: &Path, source: String) -> Result<Self> {
        let tree = parse_python(&source)?;
        Ok(Self {
            path: path.to_path_buf(),
            module_name: module_name(path, root),
            source,
            tree,
        })
    }

    pub fn load(path: &Path, root: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(path, root, source)
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    pub fn location(&self, node: Node<'_>) -> Location {
        let point = node.start_position();
        Location::new(self.path.clone(), point.row + 1, point.column)
    }

    /// Every function, class, method and top-level variable, in pre-order
    pub fn definitions(&self) -> Vec<Definition> {
        let mut out = Vec::new();
        let mut frames = Vec::new();
        self.collect_definitions(self.tree.root_node(), &mut frames, &mut out);
        out
    }

    fn collect_definitions(
        &self,
        node: Node<'_>,
        frames: &mut Vec<Frame>,
        out: &mut Vec<Definition>,
    ) {
        match node.kind() {
            "function_definition" | "class_definition" => {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let is_class = node.kind() == "class_definition";
                    let definition = self.scoped_definition(node, name_node, frames, is_class);
                    frames.push(Frame {
                        name: definition.name.clone(),
                        is_class,
                    });
                    out.push(definition);
                    if let Some(body) = node.child_by_field_name("body") {
                        self.collect_definitions(body, frames, out);
                    }
                    frames.pop();
                    return;
                }
            }
            "expression_statement"
                if frames.is_empty()
                    && node.parent().map(|p| p.kind()) == Some("module") =>
            {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "assignment" {
                        self.collect_assignment(child, out);
                    }
                }
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_definitions(child, frames, out);
        }
    }

    fn collect_assignment(&self, assignment: Node<'_>, out: &mut Vec<Definition>) {
        if let Some(left) = assignment.child_by_field_name("left") {
            match left.kind() {
                "identifier" => out.push(self.variable_definition(left)),
                "pattern_list" | "tuple_pattern" | "list_pattern" => {
                    let mut cursor = left.walk();
                    for target in left.named_children(&mut cursor) {
                        if target.kind() == "identifier" {
                            out.push(self.variable_definition(target));
                        }
                    }
                }
                _ => {}
            }
        }
        // a = b = value
        if let Some(right) = assignment.child_by_field_name("right") {
            if right.kind() == "assignment" {
                self.collect_assignment(right, out);
            }
        }
    }

    fn variable_definition(&self, target: Node<'_>) -> Definition {
        let name = self.text(target).to_string();
        Definition {
            qualified_name: qualify(&self.module_name, std::iter::empty(), &name),
            kind: SymbolKind::Variable,
            scope: if is_private_name(&name) {
                SymbolScope::Private
            } else {
                SymbolScope::Global
            },
            location: self.location(target),
            name_start: target.start_byte(),
            docstring: None,
            line_count: 1,
            parameter_count: 0,
            name,
        }
    }

    fn scoped_definition(
        &self,
        node: Node<'_>,
        name_node: Node<'_>,
        frames: &[Frame],
        is_class: bool,
    ) -> Definition {
        let name = self.text(name_node).to_string();
        let in_class = frames.last().is_some_and(|f| f.is_class);
        let kind = match (is_class, in_class) {
            (true, _) => SymbolKind::Class,
            (false, true) => SymbolKind::Method,
            (false, false) => SymbolKind::Function,
        };
        let scope = if is_private_name(&name) {
            SymbolScope::Private
        } else {
            match frames.last() {
                None => SymbolScope::Global,
                Some(frame) if frame.is_class => SymbolScope::Class,
                Some(_) => SymbolScope::Function,
            }
        };

        Definition {
            qualified_name: qualify(
                &self.module_name,
                frames.iter().map(|f| f.name.as_str()),
                &name,
            ),
            kind,
            scope,
            location: self.location(name_node),
            name_start: name_node.start_byte(),
            docstring: node
                .child_by_field_name("body")
                .and_then(|body| self.docstring(body)),
            line_count: node.end_position().row - node.start_position().row + 1,
            parameter_count: if is_class {
                0
            } else {
                self.parameter_count(node, kind == SymbolKind::Method)
            },
            name,
        }
    }

    fn parameter_count(&self, function: Node<'_>, is_method: bool) -> usize {
        let Some(parameters) = function.child_by_field_name("parameters") else {
            return 0;
        };
        let names = self.parameter_names(parameters);
        let skip_receiver = is_method
            && names
                .first()
                .is_some_and(|first| first == "self" || first == "cls");
        names.len() - usize::from(skip_receiver)
    }

    /// Parameter names of a `parameters` or `lambda_parameters` node
    pub fn parameter_names(&self, parameters: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = parameters.walk();
        for param in parameters.named_children(&mut cursor) {
            if let Some(name) = self.parameter_name(param) {
                names.push(name);
            }
        }
        names
    }

    /// Name bound by a single parameter node, without `*`/`**` prefixes
    pub fn parameter_name(&self, param: Node<'_>) -> Option<String> {
        match param.kind() {
            "identifier" => Some(self.text(param).to_string()),
            "default_parameter" | "typed_default_parameter" => param
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string()),
            "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                let mut cursor = param.walk();
                let found = param
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "identifier")
                    .map(|n| self.text(n).to_string());
                found
            }
            _ => None,
        }
    }

    fn docstring(&self, body: Node<'_>) -> Option<String> {
        let mut cursor = body.walk();
        let first = body
            .named_children(&mut cursor)
            .find(|c| c.kind() != "comment")?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0).filter(|n| n.kind() == "string")?;

        let mut cursor = string.walk();
        let content: String = string
            .children(&mut cursor)
            .filter(|c| c.kind() == "string_content")
            .map(|c| self.text(c))
            .collect();
        Some(content.trim().to_string())
    }

    /// Every identifier token spelled exactly `name`
    pub fn identifiers(&self, name: &str) -> Vec<Node<'_>> {
        let mut found = Vec::new();
        walk_preorder(self.tree.root_node(), |node| {
            if node.kind() == "identifier" && self.text(node) == name {
                found.push(node);
            }
            true
        });
        found
    }

    /// Syntax node of a function or class definition
    pub fn definition_node(&self, definition: &Definition) -> Option<Node<'_>> {
        let name_end = definition.name_start + definition.name.len();
        let name_node = self
            .tree
            .root_node()
            .descendant_for_byte_range(definition.name_start, name_end)?;
        name_node
            .parent()
            .filter(|p| matches!(p.kind(), "function_definition" | "class_definition"))
    }
}

/// Walk up from `node` to its ancestor that sits directly under the module
pub(crate) fn top_level_statement(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if parent.kind() == "module" {
            return current;
        }
        current = parent;
    }
    current
}

fn qualify<'a>(module: &'a str, frames: impl Iterator<Item = &'a str>, name: &'a str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if !module.is_empty() {
        parts.push(module);
    }
    parts.extend(frames);
    parts.push(name);
    parts.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
import os

LIMIT = 10
_cache = first = {}

def calculate_sum(a, b):
    """Add two numbers."""
    return a + b

class UserManager:
    """Manages users."""

    def __init__(self, store):
        self.store = store

    def _load(self, key):
        def inner():
            return key
        return inner()
"#;

    fn module() -> ParsedModule {
        let root = Path::new("/project");
        ParsedModule::parse(&root.join("app/users.py"), root, SOURCE.to_string())
            .expect("python source parses")
    }

    #[test]
    fn test_module_name() {
        let root = Path::new("/project");
        assert_eq!(module_name(&root.join("pkg/mod.py"), root), "pkg.mod");
        assert_eq!(module_name(&root.join("pkg/__init__.py"), root), "pkg");
        assert_eq!(module_name(&root.join("app.py"), root), "app");
    }

    #[test]
    fn test_private_names() {
        assert!(is_private_name("_load"));
        assert!(is_private_name("__mangled"));
        assert!(!is_private_name("__init__"));
        assert!(!is_private_name("public"));
    }

    #[test]
    fn test_definitions_in_preorder() {
        let module = module();
        let names: Vec<String> = module
            .definitions()
            .into_iter()
            .map(|d| d.qualified_name)
            .collect();

        assert_eq!(
            names,
            vec![
                "app.users.LIMIT",
                "app.users._cache",
                "app.users.first",
                "app.users.calculate_sum",
                "app.users.UserManager",
                "app.users.UserManager.__init__",
                "app.users.UserManager._load",
                "app.users.UserManager._load.inner",
            ]
        );
    }

    #[test]
    fn test_definition_kinds_and_scopes() {
        let module = module();
        let defs = module.definitions();
        let find = |name: &str| defs.iter().find(|d| d.name == name).cloned();

        let sum = find("calculate_sum").expect("function found");
        assert_eq!(sum.kind, SymbolKind::Function);
        assert_eq!(sum.scope, SymbolScope::Global);
        assert_eq!(sum.docstring.as_deref(), Some("Add two numbers."));
        assert_eq!(sum.parameter_count, 2);
        assert_eq!(sum.location.line, 7);

        let init = find("__init__").expect("method found");
        assert_eq!(init.kind, SymbolKind::Method);
        assert_eq!(init.scope, SymbolScope::Class);
        assert_eq!(init.parameter_count, 1);

        let load = find("_load").expect("method found");
        assert_eq!(load.scope, SymbolScope::Private);

        let inner = find("inner").expect("nested function found");
        assert_eq!(inner.kind, SymbolKind::Function);
        assert_eq!(inner.scope, SymbolScope::Function);

        let class = find("UserManager").expect("class found");
        assert_eq!(class.kind, SymbolKind::Class);
        assert_eq!(class.docstring.as_deref(), Some("Manages users."));

        let limit = find("LIMIT").expect("variable found");
        assert_eq!(limit.kind, SymbolKind::Variable);
    }

    #[test]
    fn test_identifiers_skip_strings_and_comments() {
        let root = Path::new("/p");
        let module = ParsedModule::parse(
            &root.join("m.py"),
            root,
            "x = 1\n# x here\ny = x + 'x'\n".to_string(),
        )
        .expect("parses");

        assert_eq!(module.identifiers("x").len(), 2);
    }

    #[test]
    fn test_definition_node_round_trip() {
        let module = module();
        let def = module
            .definitions()
            .into_iter()
            .find(|d| d.name == "_load")
            .expect("method found");
        let node = module.definition_node(&def).expect("node found");

        assert_eq!(node.kind(), "function_definition");
        assert_eq!(top_level_statement(node).kind(), "class_definition");
    }

    #[test]
    fn test_empty_source_has_no_definitions() {
        let root = Path::new("/p");
        let module = ParsedModule::parse(&root.join("empty.py"), root, String::new())
            .expect("empty source parses");
        assert!(module.definitions().is_empty());
    }
}
