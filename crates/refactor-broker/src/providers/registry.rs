//! Provider registry with priority ordering, capability caches and health tracking
//!
//! All state lives behind one reentrant lock. Provider callbacks
//! (`supports_language`, `capabilities`, `is_healthy`) run while the lock is
//! held but never while the inner cell is borrowed, so a provider may call
//! back into the registry from the same thread.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::RefactoringProvider;
use crate::config::HealthConfig;
use crate::language::Language;
use crate::types::Operation;

/// A registered provider with its routing metadata
#[derive(Clone)]
pub struct RegisteredProvider {
    pub name: String,
    /// Higher wins
    pub priority: i32,
    /// Registration order, used to break priority ties
    pub sequence: u64,
    pub provider: Arc<dyn RefactoringProvider>,
}

impl fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Rolling reliability record of one provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// In `[0, 1]`, starts at 1.0
    pub health_score: f64,
    pub call_count: u64,
    pub failure_count: u64,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            health_score: 1.0,
            call_count: 0,
            failure_count: 0,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    records: HashMap<String, RegisteredProvider>,
    health: HashMap<String, ProviderHealth>,
    next_sequence: u64,
    by_language: HashMap<Language, Vec<RegisteredProvider>>,
    by_capability: HashMap<(Language, Operation), Vec<RegisteredProvider>>,
}

impl RegistryState {
    fn invalidate(&mut self) {
        self.by_language.clear();
        self.by_capability.clear();
    }
}

/// Registry of refactoring providers
///
/// Language and capability lookups are cached until the next registration
/// change. Health is never cached.
pub struct ProviderRegistry {
    state: ReentrantMutex<RefCell<RegistryState>>,
    recovery_step: f64,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(&HealthConfig::default())
    }
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new(health: &HealthConfig) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(RegistryState::default())),
            recovery_step: health.recovery_step,
        }
    }

    /// Register a provider, replacing any provider with the same name
    ///
    /// The record gets a fresh registration sequence and full health.
    pub fn register(&self, provider: Arc<dyn RefactoringProvider>, priority: i32) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let name = provider.name().to_string();
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let replaced = state
            .records
            .insert(
                name.clone(),
                RegisteredProvider {
                    name: name.clone(),
                    priority,
                    sequence,
                    provider,
                },
            )
            .is_some();
        state.health.insert(name.clone(), ProviderHealth::default());
        state.invalidate();

        info!(provider = %name, priority, replaced, "Registered refactoring provider");
    }

    /// Remove a provider; returns whether it was registered
    pub fn unregister(&self, name: &str) -> bool {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let removed = state.records.remove(name).is_some();
        state.health.remove(name);
        if removed {
            state.invalidate();
            info!(provider = name, "Unregistered refactoring provider");
        }
        removed
    }

    /// Providers supporting `language`, by priority descending then registration order
    pub fn providers_for(&self, language: Language) -> Vec<RegisteredProvider> {
        let guard = self.state.lock();

        if let Some(cached) = guard.borrow().by_language.get(&language) {
            return cached.clone();
        }

        let mut records: Vec<RegisteredProvider> =
            guard.borrow().records.values().cloned().collect();
        records.retain(|r| r.provider.supports_language(language));
        records.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });

        debug!(language = %language, count = records.len(), "Cached providers for language");
        guard.borrow_mut().by_language.insert(language, records.clone());
        records
    }

    /// Highest-ranked provider for `language`
    pub fn best_provider(&self, language: Language) -> Option<Arc<dyn RefactoringProvider>> {
        self.providers_for(language)
            .into_iter()
            .next()
            .map(|r| r.provider)
    }

    /// Providers for `language` advertising `operation`, in priority order
    pub fn providers_with_capability(
        &self,
        language: Language,
        operation: Operation,
    ) -> Vec<RegisteredProvider> {
        let guard = self.state.lock();

        if let Some(cached) = guard.borrow().by_capability.get(&(language, operation)) {
            return cached.clone();
        }

        let capable: Vec<RegisteredProvider> = self
            .providers_for(language)
            .into_iter()
            .filter(|r| r.provider.capabilities(language).contains(&operation))
            .collect();

        debug!(
            language = %language,
            operation = %operation,
            count = capable.len(),
            "Cached capable providers"
        );
        guard
            .borrow_mut()
            .by_capability
            .insert((language, operation), capable.clone());
        capable
    }

    /// Providers for `language` currently considered healthy
    ///
    /// A provider is healthy when its score is above zero and it does not
    /// report itself unhealthy. Evaluated on every call.
    pub fn healthy_providers(&self, language: Language) -> Vec<RegisteredProvider> {
        let guard = self.state.lock();
        let candidates = self.providers_for(language);

        candidates
            .into_iter()
            .filter(|r| {
                let score = guard
                    .borrow()
                    .health
                    .get(&r.name)
                    .map_or(0.0, |h| h.health_score);
                score > 0.0 && r.provider.is_healthy() != Some(false)
            })
            .collect()
    }

    /// Record a non-raising call
    pub fn record_success(&self, name: &str) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if let Some(health) = state.health.get_mut(name) {
            health.call_count += 1;
            health.health_score = (health.health_score + self.recovery_step).min(1.0);
            debug!(provider = name, health = health.health_score, "Provider call succeeded");
        }
    }

    /// Record a raising call; health drops to the provider's success rate
    pub fn record_failure(&self, name: &str) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if let Some(health) = state.health.get_mut(name) {
            health.call_count += 1;
            health.failure_count += 1;
            let failure_rate = health.failure_count as f64 / health.call_count as f64;
            health.health_score = (1.0 - failure_rate).max(0.0);
            warn!(
                provider = name,
                health = health.health_score,
                failures = health.failure_count,
                calls = health.call_count,
                "Provider call failed"
            );
        }
    }

    /// Current health record of a provider
    pub fn health(&self, name: &str) -> Option<ProviderHealth> {
        let guard = self.state.lock();
        let health = guard.borrow().health.get(name).copied();
        health
    }

    /// Languages at least one registered provider supports
    pub fn supported_languages(&self) -> Vec<Language> {
        Language::KNOWN
            .into_iter()
            .filter(|language| !self.providers_for(*language).is_empty())
            .collect()
    }

    /// Union of operations advertised for `language`
    pub fn capabilities(&self, language: Language) -> Vec<Operation> {
        let operations: BTreeSet<Operation> = self
            .providers_for(language)
            .iter()
            .flat_map(|r| r.provider.capabilities(language))
            .collect();
        operations.into_iter().collect()
    }

    /// Names of every registered provider, sorted
    pub fn provider_names(&self) -> Vec<String> {
        let guard = self.state.lock();
        let mut names: Vec<String> = guard.borrow().records.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.state.lock();
        let empty = guard.borrow().records.is_empty();
        empty
    }
}
