//! Language-specific refactoring backends

pub(crate) mod edits;
pub mod python;

pub use python::PythonAstProvider;
