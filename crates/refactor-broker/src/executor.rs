//! Fallback execution across capable providers
//!
//! Candidates are tried in priority order, with health breaking ties between
//! equal priorities. A returned result, failed or not, is the final answer.
//! Only a raised error moves on to the next candidate.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{RefactoringError, Result};
use crate::language::Language;
use crate::providers::{dispatch, ProviderRegistry, RegisteredProvider};
use crate::types::{Operation, OperationFailure, OperationParameters, OperationResult};

/// Runs operations against the registry's providers with fallback
pub struct FallbackExecutor {
    registry: Arc<ProviderRegistry>,
}

impl FallbackExecutor {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Capable providers ordered by priority, then by current health
    pub fn candidates(&self, language: Language, operation: Operation) -> Vec<RegisteredProvider> {
        let mut candidates = self.registry.providers_with_capability(language, operation);
        let health: Vec<f64> = candidates
            .iter()
            .map(|c| self.registry.health(&c.name).map_or(0.0, |h| h.health_score))
            .collect();

        let mut ranked: Vec<(RegisteredProvider, f64)> = candidates.drain(..).zip(health).collect();
        // Stable: equal priority and health keep registration order
        ranked.sort_by(|(a, ha), (b, hb)| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| hb.total_cmp(ha))
        });
        ranked.into_iter().map(|(c, _)| c).collect()
    }

    /// Execute `params` for `language`
    ///
    /// Missing providers come back as failed results. `Err` is returned only
    /// when every candidate raised.
    pub fn execute(
        &self,
        language: Language,
        params: &OperationParameters,
    ) -> Result<OperationResult> {
        let operation = params.operation();
        let candidates = self.candidates(language, operation);

        if candidates.is_empty() {
            let failure = if self.registry.providers_for(language).is_empty() {
                OperationFailure::unsupported_language(language)
            } else {
                OperationFailure::operation_unsupported(language, operation)
            };
            warn!(language = %language, operation = %operation, "{}", failure.message);
            return Ok(OperationResult::failed(operation, failure));
        }

        let attempts = candidates.len();
        let mut last_error = None;

        for candidate in candidates {
            debug!(
                provider = %candidate.name,
                operation = %operation,
                "Dispatching to provider {}",
                candidate.name
            );
            match dispatch(candidate.provider.as_ref(), params) {
                Ok(result) => {
                    self.registry.record_success(&candidate.name);
                    info!(
                        provider = %candidate.name,
                        operation = %operation,
                        success = result.success(),
                        "Provider answered"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    self.registry.record_failure(&candidate.name);
                    warn!(
                        provider = %candidate.name,
                        operation = %operation,
                        error = %e,
                        "Provider raised, trying next candidate"
                    );
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| {
            RefactoringError::Other(format!("no provider attempted {}", operation))
        });
        Err(RefactoringError::AllProvidersFailed {
            operation: operation.to_string(),
            attempts,
            last_error: Box::new(last_error),
        })
    }
}
