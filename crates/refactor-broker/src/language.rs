//! Language detection and project root discovery

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::RefactoringError;

/// Markers that identify the root of a project
const PROJECT_MARKERS: &[&str] = &[
    ".git",
    "pyproject.toml",
    "setup.py",
    "Cargo.toml",
    "package.json",
];

/// Closed set of language tags the broker routes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Elixir,
    Go,
    Unknown,
}

impl Language {
    /// Every routable language, excluding `Unknown`
    pub const KNOWN: [Language; 6] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Rust,
        Language::Elixir,
        Language::Go,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Rust => "rust",
            Language::Elixir => "elixir",
            Language::Go => "go",
            Language::Unknown => "unknown",
        }
    }

    /// Map a file extension (without the dot, any case) to a language
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "py" => Language::Python,
            "js" => Language::JavaScript,
            "ts" => Language::TypeScript,
            "rs" => Language::Rust,
            "ex" => Language::Elixir,
            "go" => Language::Go,
            _ => Language::Unknown,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = RefactoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" => Ok(Language::Python),
            "javascript" => Ok(Language::JavaScript),
            "typescript" => Ok(Language::TypeScript),
            "rust" => Ok(Language::Rust),
            "elixir" => Ok(Language::Elixir),
            "go" => Ok(Language::Go),
            "unknown" => Ok(Language::Unknown),
            other => Err(RefactoringError::Other(format!("Unknown language: {}", other))),
        }
    }
}

/// Detect a file's language from its extension
pub fn detect_language(path: &Path) -> Language {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(Language::from_extension)
        .unwrap_or(Language::Unknown)
}

/// Find the project root by walking up from `start` looking for project markers
///
/// Falls back to `start` itself when no marker is found.
pub fn find_project_root(start: &Path) -> PathBuf {
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(start))
            .unwrap_or_else(|_| start.to_path_buf())
    };

    let mut current = start.as_path();
    loop {
        if PROJECT_MARKERS.iter().any(|marker| current.join(marker).exists()) {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return start,
        }
    }
}

/// Most frequent known language among the files under `root`
///
/// Ties go to the language that sorts first, so the answer is stable.
pub fn detect_project_language(root: &Path) -> Option<Language> {
    let mut counts: HashMap<Language, usize> = HashMap::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let language = detect_language(entry.path());
        if language != Language::Unknown {
            *counts.entry(language).or_default() += 1;
        }
    }

    let detected = counts
        .into_iter()
        .max_by(|(la, ca), (lb, cb)| ca.cmp(cb).then_with(|| lb.cmp(la)))
        .map(|(language, _)| language);
    debug!(root = %root.display(), language = ?detected, "Detected project language");
    detected
}
