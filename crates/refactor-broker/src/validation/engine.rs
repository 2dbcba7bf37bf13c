//! Parameter validation performed before any provider is consulted

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::types::{OperationFailure, OperationParameters};

/// Identifier syntax accepted for new names
pub const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(IDENTIFIER_PATTERN).unwrap()
});

/// Check a name against the identifier syntax
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Validates operation parameters
///
/// Failures are reported as `ValidationFailed` results, never raised.
pub struct ParameterValidator;

impl ParameterValidator {
    /// Validate a request, returning the first problem found
    pub fn validate(params: &OperationParameters) -> Option<OperationFailure> {
        if params.target().trim().is_empty() {
            let field = match params {
                OperationParameters::Analyze(_) | OperationParameters::Rename(_) => "symbol",
                OperationParameters::Extract(_) => "source",
                OperationParameters::Find(_) => "pattern",
                OperationParameters::Show(_) => "function_name",
            };
            return Some(OperationFailure::validation(field, "must not be empty"));
        }

        if let Some(new_name) = params.new_name() {
            if let Some(failure) = Self::validate_new_name(params, new_name) {
                return Some(failure);
            }
        }

        params.file_path().and_then(Self::validate_file_path)
    }

    fn validate_new_name(params: &OperationParameters, new_name: &str) -> Option<OperationFailure> {
        if !is_valid_identifier(new_name) {
            return Some(
                OperationFailure::validation(
                    "new_name",
                    format!(
                        "'{}' must be a valid identifier (letters, numbers, underscores only)",
                        new_name
                    ),
                )
                .with_suggestions([format!("Use a name matching {}", IDENTIFIER_PATTERN)]),
            );
        }

        if let OperationParameters::Rename(rename) = params {
            let current = rename.symbol.rsplit('.').next().unwrap_or(&rename.symbol);
            if current == new_name {
                return Some(OperationFailure::validation(
                    "new_name",
                    "new name is identical to the current name",
                ));
            }
        }

        None
    }

    fn validate_file_path(path: &Path) -> Option<OperationFailure> {
        if !path.exists() {
            return Some(
                OperationFailure::validation(
                    "file_path",
                    format!("{} does not exist", path.display()),
                )
                .with_suggestions([
                    "Pass a path relative to the working directory or an absolute path",
                ]),
            );
        }

        if !path.is_file() {
            return Some(OperationFailure::validation(
                "file_path",
                format!("{} is not a file", path.display()),
            ));
        }

        None
    }
}
