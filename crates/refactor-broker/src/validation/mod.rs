//! Parameter validation boundary

pub mod engine;

pub use engine::{is_valid_identifier, ParameterValidator, IDENTIFIER_PATTERN};
