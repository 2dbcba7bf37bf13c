//! End-to-end scenarios against the built-in Python backend
//!
//! Each test builds a throwaway project and a broker whose backups live in
//! their own temporary directory.

mod common;

use std::sync::Arc;

use common::{project, read, Behavior, ScriptedProvider};
use refactor_broker::{
    AnalyzeParams, BrokerConfig, ElementKind, ErrorKind, ExtractParams, FileBackupService,
    FindParams, Operation, RefactoringBroker, RefactoringError, RenameParams, ShowParams,
};
use tempfile::TempDir;

fn broker_for(dir: &TempDir, backups: &TempDir) -> RefactoringBroker {
    let mut config = BrokerConfig::default();
    config.backup.backup_dir = Some(backups.path().to_path_buf());
    RefactoringBroker::with_python(dir.path(), config).expect("valid configuration")
}

const CALCULATOR: &str = "\
def calculate_sum(a, b):
    return a + b


total = calculate_sum(1, 2)
other = calculate_sum(3, 4)
print(calculate_sum(5, 6))
";

#[test]
fn test_rename_updates_definition_and_every_call() {
    let dir = project(&[("calc.py", CALCULATOR)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let result = broker
        .rename_symbol(RenameParams::new("calculate_sum", "add_numbers"))
        .expect("rename");

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.references_updated, 4);
    assert_eq!(result.qualified_name.as_deref(), Some("calc.calculate_sum"));
    assert!(result.backup_id.is_some());

    let source = read(dir.path(), "calc.py").expect("read");
    assert!(!source.contains("calculate_sum"));
    assert_eq!(source.matches("add_numbers").count(), 4);
    assert!(broker.list_backups().is_empty());
}

#[test]
fn test_rename_conflict_leaves_file_untouched() {
    let original = "\
def process_data(rows):
    return [r for r in rows]


def handle_data(rows):
    return process_data(rows)
";
    let dir = project(&[("pipeline.py", original)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let result = broker
        .rename_symbol(RenameParams::new("process_data", "handle_data"))
        .expect("conflict is a result");

    assert!(!result.success);
    assert_eq!(
        result.error.as_ref().map(|e| e.error_kind),
        Some(ErrorKind::NamingConflict)
    );
    assert_eq!(result.conflicts.len(), 1);
    assert!(result.conflicts[0].contains("handle_data"));
    assert!(result.backup_id.is_none());
    assert_eq!(read(dir.path(), "pipeline.py").expect("read"), original);
}

#[test]
fn test_rename_round_trip_restores_original_bytes() {
    let app = "def helper(x):\n    return x + 1\n";
    let main = "from app import helper\n\nprint(helper(2))\n";
    let dir = project(&[("app.py", app), ("main.py", main)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let forward = broker
        .rename_symbol(RenameParams::new("helper", "assist"))
        .expect("rename");
    assert!(forward.success);
    assert_eq!(forward.files_modified.len(), 2);
    assert!(read(dir.path(), "main.py").expect("read").contains("import assist"));

    let back = broker
        .rename_symbol(RenameParams::new("assist", "helper"))
        .expect("rename back");
    assert!(back.success);

    assert_eq!(read(dir.path(), "app.py").expect("read"), app);
    assert_eq!(read(dir.path(), "main.py").expect("read"), main);
}

#[test]
fn test_rename_method_keeps_unrelated_function_of_same_name() {
    let module_level = "def helper():\n    return 1\n\n\nprint(helper())\n";
    let store = "\
class Store:
    def helper(self):
        return 2

    def load(self):
        return self.helper()
";
    let dir = project(&[
        ("a.py", module_level),
        ("pkg/__init__.py", ""),
        ("pkg/b.py", store),
    ])
    .expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let result = broker
        .rename_symbol(RenameParams::new("pkg.b.Store.helper", "fetch"))
        .expect("rename");

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.qualified_name.as_deref(), Some("pkg.b.Store.helper"));
    assert_eq!(result.files_modified, vec![dir.path().join("pkg/b.py")]);
    assert_eq!(read(dir.path(), "a.py").expect("read"), module_level);
    assert_eq!(
        read(dir.path(), "pkg/b.py").expect("read"),
        store.replace("helper", "fetch")
    );
}

#[test]
fn test_find_with_glob_is_case_insensitive() {
    let source = "\
def user_login(name):
    return name


class UserManager:
    pass


def admin_panel():
    pass
";
    let dir = project(&[("accounts.py", source)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let result = broker.find_symbols(FindParams::new("*user*")).expect("find");

    let names: Vec<&str> = result.matches.iter().map(|m| m.name.as_str()).collect();
    assert!(result.success);
    assert!(names.contains(&"user_login"));
    assert!(names.contains(&"UserManager"));
    assert!(!names.contains(&"admin_panel"));
    assert_eq!(result.total_count, names.len());
}

const TRANSFORM: &str = "\
def transform(items):
    doubled = map(lambda x: x * 2, items)
    kept = filter(lambda x: x > 0, doubled)
    squares = [y * y for y in kept]
    return sorted(squares, key=lambda v: -v)
";

#[test]
fn test_show_lists_only_lambdas() {
    let dir = project(&[("app.py", TRANSFORM)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let result = broker
        .show_function(ShowParams::new("transform"))
        .expect("show");

    assert!(result.success);
    let ids: Vec<&str> = result
        .extractable_elements
        .iter()
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(
        ids,
        vec![
            "app.transform.lambda_1",
            "app.transform.lambda_2",
            "app.transform.lambda_3"
        ]
    );
    assert!(result
        .extractable_elements
        .iter()
        .all(|e| e.kind == ElementKind::Lambda && e.is_extractable));
}

#[test]
fn test_extract_lambda_through_broker() {
    let dir = project(&[("app.py", TRANSFORM)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let result = broker
        .extract_element(ExtractParams::new("app.transform.lambda_1", "double"))
        .expect("extract");

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.parameters, vec!["x".to_string()]);
    assert!(result.backup_id.is_some());

    let source = read(dir.path(), "app.py").expect("read");
    assert!(source.contains("def double(x):\n    return x * 2\n"));
    assert!(source.contains("map(double, items)"));
}

#[test]
fn test_extract_rejects_malformed_source() {
    let dir = project(&[("app.py", TRANSFORM)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let result = broker
        .extract_element(ExtractParams::new("transform", "double"))
        .expect("result");

    assert_eq!(
        result.error.map(|e| e.error_kind),
        Some(ErrorKind::InvalidSource)
    );
    assert_eq!(read(dir.path(), "app.py").expect("read"), TRANSFORM);
}

#[test]
fn test_unknown_symbol_suggests_similar_names() {
    let dir = project(&[("calc.py", CALCULATOR)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let analysis = broker
        .analyze_symbol(AnalyzeParams::new("calculate_sm"))
        .expect("result");
    let failure = analysis.error.expect("not found");
    assert_eq!(failure.error_kind, ErrorKind::SymbolNotFound);
    assert!(failure.suggestions[0].contains("calculate_sum"));

    let show = broker
        .show_function(ShowParams::new("total"))
        .expect("result");
    assert_eq!(
        show.error.map(|e| e.error_kind),
        Some(ErrorKind::FunctionNotFound)
    );
}

#[test]
fn test_analysis_reports_references() {
    let dir = project(&[("calc.py", CALCULATOR)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let result = broker
        .analyze_symbol(AnalyzeParams::new("calc.calculate_sum"))
        .expect("analyze");

    assert!(result.success);
    assert_eq!(result.reference_count, 3);
    let symbol = result.symbol_info.expect("symbol");
    assert_eq!(symbol.name, "calculate_sum");
    assert_eq!(symbol.definition_location.line, 1);
}

#[test]
fn test_strict_mode_reports_ambiguity() {
    let helper = "def helper():\n    return 1\n";
    let dir = project(&[("a.py", helper), ("b.py", helper)]).expect("project");
    let backups = TempDir::new().expect("backups");

    let lenient = broker_for(&dir, &backups);
    let first = lenient
        .analyze_symbol(AnalyzeParams::new("helper"))
        .expect("analyze");
    assert_eq!(
        first.symbol_info.map(|s| s.qualified_name),
        Some("a.helper".to_string())
    );

    let mut config = BrokerConfig::default();
    config.backup.backup_dir = Some(backups.path().to_path_buf());
    config.resolver.strict_qualified_names = true;
    let strict = RefactoringBroker::with_python(dir.path(), config).expect("valid configuration");

    let ambiguous = strict
        .analyze_symbol(AnalyzeParams::new("helper"))
        .expect("result");
    let failure = ambiguous.error.expect("ambiguous");
    assert_eq!(failure.error_kind, ErrorKind::AmbiguousSymbol);
    assert!(failure.suggestions[0].contains("a.helper"));
    assert!(failure.suggestions[0].contains("b.helper"));

    let qualified = strict
        .analyze_symbol(AnalyzeParams::new("b.helper"))
        .expect("analyze");
    assert_eq!(
        qualified.symbol_info.map(|s| s.qualified_name),
        Some("b.helper".to_string())
    );
}

#[test]
fn test_invalid_file_path_is_rejected() {
    let dir = project(&[("calc.py", CALCULATOR)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let broker = broker_for(&dir, &backups);

    let mut params = RenameParams::new("calculate_sum", "add_numbers");
    params.file_path = Some(dir.path().join("missing.py"));
    let result = broker.rename_symbol(params).expect("result");

    assert_eq!(
        result.error.map(|e| e.error_kind),
        Some(ErrorKind::ValidationFailed)
    );
    assert_eq!(read(dir.path(), "calc.py").expect("read"), CALCULATOR);
}

#[test]
fn test_invalid_configuration_is_refused() {
    let dir = project(&[("calc.py", CALCULATOR)]).expect("project");
    let mut config = BrokerConfig::default();
    config.health.recovery_step = 0.0;

    let err = RefactoringBroker::with_python(dir.path(), config)
        .err()
        .expect("invalid configuration");
    assert!(matches!(err, RefactoringError::InvalidConfiguration(_)));
}

#[test]
fn test_preserved_backup_restores_files_on_disk() {
    let dir = project(&[("calc.py", CALCULATOR)]).expect("project");
    let backups = TempDir::new().expect("backups");
    let service = Arc::new(FileBackupService::new(backups.path()).expect("backup root"));
    let broker = RefactoringBroker::new(dir.path(), BrokerConfig::default(), service);
    broker.register(
        ScriptedProvider::new("broken", &Operation::ALL, Behavior::Raise)
            .with_affected_files(vec![dir.path().join("calc.py")])
            .arc(),
        1,
    );

    let err = broker
        .rename_symbol(RenameParams::new("calculate_sum", "add_numbers"))
        .expect_err("every provider raised");
    let operation_id = err.operation_id().expect("operation id").to_string();

    let kept = broker.list_backups();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].operation_id, operation_id);

    std::fs::write(dir.path().join("calc.py"), "garbage\n").expect("clobber");
    assert!(broker.restore_backup(&operation_id));
    assert_eq!(read(dir.path(), "calc.py").expect("read"), CALCULATOR);
}
