//! Scope-aware occurrence search for renames
//!
//! A definition is bound at module level, as a class member, or locally
//! inside a function. Module bindings are followed into the files that import
//! them, members through attribute access, and locals stay inside their
//! function. Identifiers rebound by an inner scope are left alone.

use std::path::PathBuf;

use tracing::debug;
use tree_sitter::Node;

use super::syntax::{walk_preorder, Definition, ParsedModule};
use super::SymbolResolver;

const COMPREHENSIONS: &[&str] = &[
    "list_comprehension",
    "set_comprehension",
    "dictionary_comprehension",
    "generator_expression",
];

/// Where a definition's name lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    Module,
    Member,
    Local,
}

/// Byte ranges of one definition's occurrences inside one module
pub(crate) struct BoundOccurrences {
    pub module: ParsedModule,
    pub ranges: Vec<(usize, usize)>,
    /// The module binds the name itself, by defining or importing it unaliased
    pub binds_name: bool,
}

impl SymbolResolver {
    /// Occurrences bound to `definition`, one entry per touched module in file order
    ///
    /// The defining module always comes back, even when it only holds the
    /// definition itself.
    pub(crate) fn bound_occurrences(
        &self,
        files: &[PathBuf],
        definition: &Definition,
    ) -> Vec<BoundOccurrences> {
        let Some(module) = self.load(&definition.location.file) else {
            return Vec::new();
        };
        let Some((binding, ranges)) = defining_ranges(&module, definition) else {
            debug!(symbol = %definition.qualified_name, "Definition no longer in source");
            return Vec::new();
        };
        debug!(symbol = %definition.qualified_name, ?binding, "Classified binding");

        let source_module = module.module_name.clone();
        let mut defining = Some(BoundOccurrences {
            module,
            ranges,
            binds_name: true,
        });

        let mut found = Vec::new();
        for file in files {
            if defining.as_ref().is_some_and(|d| &d.module.path == file) {
                found.extend(defining.take());
                continue;
            }
            if binding == Binding::Local {
                continue;
            }
            let Some(module) = self.load(file) else {
                continue;
            };
            let (ranges, binds_name) = match binding {
                Binding::Member => (attribute_ranges(&module, &definition.name, None), false),
                _ => imported_ranges(&module, &source_module, &definition.name),
            };
            if !ranges.is_empty() {
                found.push(BoundOccurrences {
                    module,
                    ranges,
                    binds_name,
                });
            }
        }
        // Defining file outside `files`
        found.extend(defining);
        found
    }
}

/// Binding kind and occurrence ranges within the module that defines the name
pub(crate) fn defining_ranges(
    module: &ParsedModule,
    definition: &Definition,
) -> Option<(Binding, Vec<(usize, usize)>)> {
    let name = definition.name.as_str();
    let name_node = module
        .tree
        .root_node()
        .descendant_for_byte_range(definition.name_start, definition.name_start + name.len())
        .filter(|node| node.kind() == "identifier" && module.text(*node) == name)?;

    let mut ranges = vec![(name_node.start_byte(), name_node.end_byte())];
    let binding = match enclosing_scope(name_node) {
        None => {
            ranges.extend(reference_ranges(module, module.tree.root_node(), name));
            Binding::Module
        }
        Some(scope) if scope.kind() == "class_definition" => {
            ranges.extend(class_body_ranges(module, scope, name));
            ranges.extend(attribute_ranges(module, name, None));
            Binding::Member
        }
        Some(scope) => {
            ranges.extend(reference_ranges(module, scope, name));
            Binding::Local
        }
    };
    ranges.sort_unstable();
    ranges.dedup();
    Some((binding, ranges))
}

/// Ranges in a module that does not define the name but may import it from `source_module`
pub(crate) fn imported_ranges(
    module: &ParsedModule,
    source_module: &str,
    name: &str,
) -> (Vec<(usize, usize)>, bool) {
    let mut ranges = Vec::new();
    let mut binds_name = false;
    let mut aliases: Vec<String> = Vec::new();

    walk_preorder(module.tree.root_node(), |node| match node.kind() {
        "import_from_statement" => {
            let Some(from) = node
                .child_by_field_name("module_name")
                .and_then(|m| imported_module(module, m))
            else {
                return false;
            };
            let mut cursor = node.walk();
            for imported in node.children_by_field_name("name", &mut cursor) {
                let (target, alias) = match imported.kind() {
                    "aliased_import" => (
                        imported.child_by_field_name("name"),
                        imported.child_by_field_name("alias"),
                    ),
                    _ => (Some(imported), None),
                };
                let Some(target) = target else {
                    continue;
                };
                let target_text = compact(module.text(target));
                if from == source_module && target_text == name {
                    ranges.push((target.start_byte(), target.end_byte()));
                    binds_name |= alias.is_none();
                } else if join_module(&from, &target_text) == source_module {
                    // `from pkg import mod` then `mod.name`
                    aliases.push(alias.map_or(target_text, |a| module.text(a).to_string()));
                }
            }
            let mut cursor = node.walk();
            let wildcard = node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "wildcard_import");
            binds_name |= wildcard && from == source_module;
            false
        }
        "import_statement" => {
            let mut cursor = node.walk();
            for imported in node.children_by_field_name("name", &mut cursor) {
                match imported.kind() {
                    "aliased_import" => {
                        let names_source = imported
                            .child_by_field_name("name")
                            .is_some_and(|n| compact(module.text(n)) == source_module);
                        if let Some(alias) = imported.child_by_field_name("alias") {
                            if names_source {
                                aliases.push(module.text(alias).to_string());
                            }
                        }
                    }
                    _ => {
                        let text = compact(module.text(imported));
                        if text == source_module {
                            aliases.push(text);
                        }
                    }
                }
            }
            false
        }
        _ => true,
    });

    if binds_name {
        ranges.extend(reference_ranges(module, module.tree.root_node(), name));
    }
    if !aliases.is_empty() {
        ranges.extend(attribute_ranges(module, name, Some(&aliases)));
    }
    ranges.sort_unstable();
    ranges.dedup();
    (ranges, binds_name)
}

fn is_scope_definition(node: Node<'_>) -> bool {
    matches!(node.kind(), "function_definition" | "class_definition")
}

/// Nearest function or class around the name, not counting the one it names
fn enclosing_scope(name_node: Node<'_>) -> Option<Node<'_>> {
    let mut current = name_node.parent()?;
    if is_scope_definition(current) && current.child_by_field_name("name") == Some(name_node) {
        current = current.parent()?;
    }
    loop {
        if is_scope_definition(current) {
            return Some(current);
        }
        current = current.parent()?;
    }
}

/// Whether an identifier reads or writes a variable, as opposed to naming
/// an attribute, keyword, parameter, definition or import path
fn is_plain_reference(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    let in_field = |field: &str| parent.child_by_field_name(field) == Some(node);
    match parent.kind() {
        "attribute" => !in_field("attribute"),
        "keyword_argument"
        | "function_definition"
        | "class_definition"
        | "default_parameter"
        | "typed_default_parameter" => !in_field("name"),
        "parameters" | "lambda_parameters" | "typed_parameter" | "dotted_name"
        | "aliased_import" => false,
        "list_splat_pattern" | "dictionary_splat_pattern" => !parent.parent().is_some_and(|p| {
            matches!(
                p.kind(),
                "parameters" | "lambda_parameters" | "typed_parameter"
            )
        }),
        _ => true,
    }
}

/// Plain references to `name` under `scope_root` that are not rebound in between
fn reference_ranges(
    module: &ParsedModule,
    scope_root: Node<'_>,
    name: &str,
) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    walk_preorder(scope_root, |node| {
        if node.kind() == "identifier"
            && module.text(node) == name
            && is_plain_reference(node)
            && !is_shadowed(module, node, scope_root, name)
        {
            ranges.push((node.start_byte(), node.end_byte()));
        }
        true
    });
    ranges
}

/// Plain references in a class body itself; method bodies cannot see class names
fn class_body_ranges(module: &ParsedModule, class: Node<'_>, name: &str) -> Vec<(usize, usize)> {
    let Some(body) = class.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut ranges = Vec::new();
    walk_preorder(body, |node| {
        let kind = node.kind();
        if is_scope_definition(node) || kind == "lambda" || COMPREHENSIONS.contains(&kind) {
            return false;
        }
        if kind == "identifier" && module.text(node) == name && is_plain_reference(node) {
            ranges.push((node.start_byte(), node.end_byte()));
        }
        true
    });
    ranges
}

/// `<object>.name` attribute ranges, optionally only on the given objects
fn attribute_ranges(
    module: &ParsedModule,
    name: &str,
    objects: Option<&[String]>,
) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    walk_preorder(module.tree.root_node(), |node| {
        if node.kind() != "attribute" {
            return true;
        }
        let Some(attribute) = node.child_by_field_name("attribute") else {
            return true;
        };
        let object_matches = match objects {
            None => true,
            Some(objects) => node.child_by_field_name("object").is_some_and(|object| {
                let text = compact(module.text(object));
                objects.iter().any(|o| *o == text)
            }),
        };
        if object_matches && module.text(attribute) == name {
            ranges.push((attribute.start_byte(), attribute.end_byte()));
        }
        true
    });
    ranges
}

/// Whether an inner scope between `node` and `scope_root` rebinds `name`
fn is_shadowed(module: &ParsedModule, node: Node<'_>, scope_root: Node<'_>, name: &str) -> bool {
    let mut inside_function = false;
    let mut child = node;
    while let Some(parent) = child.parent() {
        if parent == scope_root {
            break;
        }
        let in_body = parent.child_by_field_name("body") == Some(child);
        match parent.kind() {
            "function_definition" if in_body => {
                if binds_locally(module, parent, name) {
                    return true;
                }
                inside_function = true;
            }
            "lambda" if in_body => {
                let rebinds = parent
                    .child_by_field_name("parameters")
                    .is_some_and(|p| module.parameter_names(p).iter().any(|n| n == name));
                if rebinds {
                    return true;
                }
                inside_function = true;
            }
            // Class scopes are invisible to the functions nested in them
            "class_definition" if in_body && !inside_function => {
                if binds_in_block(module, child, name) {
                    return true;
                }
            }
            kind if COMPREHENSIONS.contains(&kind) => {
                if comprehension_binds(module, parent, name) {
                    return true;
                }
                inside_function = true;
            }
            _ => {}
        }
        child = parent;
    }
    false
}

fn binds_locally(module: &ParsedModule, function: Node<'_>, name: &str) -> bool {
    let in_parameters = function
        .child_by_field_name("parameters")
        .is_some_and(|p| module.parameter_names(p).iter().any(|n| n == name));
    in_parameters
        || function
            .child_by_field_name("body")
            .is_some_and(|body| binds_in_block(module, body, name))
}

/// Whether a function or class body assigns, imports or defines `name`
///
/// A `global` or `nonlocal` declaration of the name cancels the binding.
fn binds_in_block(module: &ParsedModule, block: Node<'_>, name: &str) -> bool {
    let mut binds = false;
    let mut declared_outer = false;
    walk_preorder(block, |node| {
        if node == block {
            return true;
        }
        match node.kind() {
            "function_definition" | "class_definition" => {
                binds |= node
                    .child_by_field_name("name")
                    .is_some_and(|n| module.text(n) == name);
                false
            }
            "global_statement" | "nonlocal_statement" => {
                let mut cursor = node.walk();
                declared_outer |= node
                    .named_children(&mut cursor)
                    .any(|c| c.kind() == "identifier" && module.text(c) == name);
                false
            }
            "assignment" | "augmented_assignment" | "for_statement" => {
                binds |= node
                    .child_by_field_name("left")
                    .is_some_and(|target| target_binds(module, target, name));
                true
            }
            "named_expression" => {
                binds |= node
                    .child_by_field_name("name")
                    .is_some_and(|n| module.text(n) == name);
                true
            }
            "as_pattern" => {
                binds |= node
                    .child_by_field_name("alias")
                    .is_some_and(|target| target_binds(module, target, name));
                true
            }
            "import_statement" | "import_from_statement" => {
                binds |= import_binds(module, node, name);
                false
            }
            kind => kind != "lambda" && !COMPREHENSIONS.contains(&kind),
        }
    });
    binds && !declared_outer
}

fn target_binds(module: &ParsedModule, target: Node<'_>, name: &str) -> bool {
    match target.kind() {
        "identifier" => module.text(target) == name,
        "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern"
        | "as_pattern_target" | "parenthesized_expression" | "tuple" | "list" => {
            let mut cursor = target.walk();
            let found = target
                .named_children(&mut cursor)
                .any(|child| target_binds(module, child, name));
            found
        }
        _ => false,
    }
}

fn comprehension_binds(module: &ParsedModule, comprehension: Node<'_>, name: &str) -> bool {
    let mut cursor = comprehension.walk();
    let found = comprehension
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "for_in_clause")
        .any(|clause| {
            clause
                .child_by_field_name("left")
                .is_some_and(|target| target_binds(module, target, name))
        });
    found
}

/// Whether an import statement binds `name` in the scope it sits in
fn import_binds(module: &ParsedModule, statement: Node<'_>, name: &str) -> bool {
    let from_import = statement.kind() == "import_from_statement";
    let mut cursor = statement.walk();
    let found = statement
        .children_by_field_name("name", &mut cursor)
        .any(|imported| match imported.kind() {
            "aliased_import" => imported
                .child_by_field_name("alias")
                .is_some_and(|alias| module.text(alias) == name),
            _ if from_import => compact(module.text(imported)) == name,
            // `import a.b` binds `a`
            _ => module.text(imported).split('.').next().map(str::trim) == Some(name),
        });
    found
}

/// Absolute module named by the `module_name` of a `from` import
fn imported_module(module: &ParsedModule, node: Node<'_>) -> Option<String> {
    match node.kind() {
        "dotted_name" => Some(compact(module.text(node))),
        "relative_import" => {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            let dots = children
                .iter()
                .find(|c| c.kind() == "import_prefix")
                .map_or(0, |prefix| module.text(*prefix).matches('.').count());

            let mut package: Vec<&str> = module
                .module_name
                .split('.')
                .filter(|part| !part.is_empty())
                .collect();
            let is_package = module.path.file_stem().is_some_and(|stem| stem == "__init__");
            if !is_package {
                package.pop();
            }
            for _ in 1..dots {
                package.pop()?;
            }

            let mut parts: Vec<String> = package.into_iter().map(str::to_string).collect();
            if let Some(rest) = children.iter().find(|c| c.kind() == "dotted_name") {
                parts.push(compact(module.text(*rest)));
            }
            Some(parts.join("."))
        }
        _ => None,
    }
}

fn join_module(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

fn compact(text: &str) -> String {
    text.split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(path: &str, source: &str) -> ParsedModule {
        let root = Path::new("/project");
        ParsedModule::parse(&root.join(path), root, source.to_string())
            .expect("python source parses")
    }

    fn texts(module: &ParsedModule, ranges: &[(usize, usize)]) -> Vec<String> {
        ranges
            .iter()
            .map(|&(start, end)| module.source[start..end].to_string())
            .collect()
    }

    fn definition(module: &ParsedModule, qualified_name: &str) -> Definition {
        module
            .definitions()
            .into_iter()
            .find(|d| d.qualified_name == qualified_name)
            .expect("definition exists")
    }

    const SHADOWING: &str = "\
def helper():
    return 1


def use(helper):
    return helper


def local():
    helper = 2
    return [helper for helper in range(3)]


def reset():
    global helper
    helper = None


def call():
    return helper()
";

    #[test]
    fn test_module_binding_skips_shadowing_scopes() {
        let module = parse("a.py", SHADOWING);
        let (binding, ranges) =
            defining_ranges(&module, &definition(&module, "a.helper")).expect("still defined");

        assert_eq!(binding, Binding::Module);
        assert!(texts(&module, &ranges).iter().all(|t| t == "helper"));

        let start = SHADOWING.find("def use").unwrap_or(0);
        let end = SHADOWING.find("def reset").unwrap_or(0);
        assert!(ranges.iter().all(|(offset, _)| !(start..end).contains(offset)));
        // definition, `global helper`, the global assignment and the call
        assert_eq!(ranges.len(), 4);
    }

    #[test]
    fn test_member_binding_follows_attribute_access() {
        let source = "\
class Store:
    def helper(self):
        return 2

    def load(self):
        return self.helper()


def helper():
    return helper
";
        let module = parse("pkg/b.py", source);
        let method = definition(&module, "pkg.b.Store.helper");
        let (binding, ranges) = defining_ranges(&module, &method).expect("still defined");

        assert_eq!(binding, Binding::Member);
        assert_eq!(ranges.len(), 2);
        let second_line_start = source.find("        return self").unwrap_or(0);
        assert!(ranges[1].0 > second_line_start);
        let module_level = source.find("\ndef helper").unwrap_or(0);
        assert!(ranges.iter().all(|(start, _)| *start < module_level));
    }

    #[test]
    fn test_local_binding_stays_in_function() {
        let source = "\
def outer():
    def step():
        return 1
    return step()


def step():
    return 0
";
        let module = parse("m.py", source);
        let (binding, ranges) =
            defining_ranges(&module, &definition(&module, "m.outer.step")).expect("still defined");

        assert_eq!(binding, Binding::Local);
        assert_eq!(ranges.len(), 2);
        let module_level = source.find("\ndef step").unwrap_or(0);
        assert!(ranges.iter().all(|(start, _)| *start < module_level));
    }

    #[test]
    fn test_imports_bind_plain_and_module_aliases() {
        let source = "\
from app import helper
import app as tools

helper()
tools.helper()
other.helper()
";
        let module = parse("main.py", source);
        let (ranges, binds_name) = imported_ranges(&module, "app", "helper");

        assert!(binds_name);
        assert_eq!(ranges.len(), 3);
        let unrelated = source.find("other").unwrap_or(0);
        assert!(ranges.iter().all(|(start, _)| *start < unrelated));
    }

    #[test]
    fn test_aliased_relative_import_renames_only_the_import() {
        let module = parse("pkg/c.py", "from .b import helper as fetch\n\nfetch()\n");
        let (ranges, binds_name) = imported_ranges(&module, "pkg.b", "helper");

        assert!(!binds_name);
        assert_eq!(texts(&module, &ranges), vec!["helper"]);
    }

    #[test]
    fn test_unrelated_module_is_untouched() {
        let module = parse("c.py", "from other import helper\n\nhelper()\n");
        let (ranges, binds_name) = imported_ranges(&module, "app", "helper");

        assert!(ranges.is_empty());
        assert!(!binds_name);
    }
}
