//! Operation timing and completion logging

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span};

use crate::error::Result;
use crate::types::Operation;

/// Timing and outcome of one broker call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMetrics {
    pub operation: Operation,
    pub target: String,
    pub duration_ms: f64,
    /// The call returned `Ok`; a failed result still counts
    pub completed: bool,
    pub error_message: Option<String>,
}

/// Run `f` inside an `operation` span and log how it ended
pub fn track_operation<T, F>(
    operation: Operation,
    target: &str,
    f: F,
) -> (Result<T>, OperationMetrics)
where
    F: FnOnce() -> Result<T>,
{
    let span = info_span!("refactoring_operation", operation = %operation, request = target);
    let _entered = span.enter();

    debug!("Started operation: {}", operation);
    let started = Instant::now();
    let result = f();
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    let metrics = OperationMetrics {
        operation,
        target: target.to_string(),
        duration_ms,
        completed: result.is_ok(),
        error_message: result.as_ref().err().map(ToString::to_string),
    };

    match &metrics.error_message {
        None => info!(duration_ms, "Completed operation: {}", operation),
        Some(message) => error!(duration_ms, "Failed operation: {} - {}", operation, message),
    }

    (result, metrics)
}
