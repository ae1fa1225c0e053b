//! Registry of named circuit breakers.
//!
//! The registry never takes part in a guarded call; it only keeps
//! references to breakers so that monitoring code can enumerate, inspect,
//! and reset them. Its map has its own lock, independent of every
//! breaker's lock.
//!
//! Code that can pass a [`BreakerRegistry`] around should do so. For call
//! sites that cannot, [`global()`] returns a lazily initialised
//! process-wide instance. Tests sharing it run in parallel, so each one
//! registers breakers under names no other test uses and
//! [`unregister`](BreakerRegistry::unregister)s them when done.

use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::breaker::{CircuitBreaker, Fallback};
use crate::config::BreakerConfig;
use crate::error::ConfigError;
use crate::stats::StatsSnapshot;

lazy_static! {
    static ref GLOBAL_REGISTRY: BreakerRegistry = BreakerRegistry::new();
}

/// The process-wide registry, created on first access.
pub fn global() -> &'static BreakerRegistry {
    &GLOBAL_REGISTRY
}

/// Declare a named breaker and track it in the global registry.
///
/// Use [`CircuitBreaker::builder`] when a custom classifier is needed.
pub fn create_breaker(
    name: impl Into<String>,
    failure_threshold: u32,
    timeout_seconds: f64,
    success_threshold: u32,
    fallback: Option<Fallback>,
) -> Result<Arc<CircuitBreaker>, ConfigError> {
    let config = BreakerConfig::new(failure_threshold, timeout_seconds, success_threshold)?;
    global().create(name, config, fallback)
}

/// Tracks breakers by name.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: RwLock<BTreeMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `breaker` under its name.
    ///
    /// An existing breaker with the same name is replaced and returned.
    pub fn register(&self, breaker: Arc<CircuitBreaker>) -> Option<Arc<CircuitBreaker>> {
        let name = breaker.name().to_string();
        let previous = self.breakers.write().insert(name.clone(), breaker);
        if previous.is_some() {
            tracing::warn!(breaker = %name, "Replaced previously registered circuit breaker");
        }
        previous
    }

    /// Build a breaker from `config` and register it.
    pub fn create(
        &self,
        name: impl Into<String>,
        config: BreakerConfig,
        fallback: Option<Fallback>,
    ) -> Result<Arc<CircuitBreaker>, ConfigError> {
        CircuitBreaker::builder(name)
            .config(config)
            .with_fallback(fallback)
            .register(self)
    }

    /// Stop tracking a breaker. The breaker itself keeps working.
    pub fn unregister(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(name).cloned()
    }

    pub fn get_stats(&self, name: &str) -> Option<StatsSnapshot> {
        self.get(name).map(|breaker| breaker.stats())
    }

    /// Snapshots of every tracked breaker, ordered by name.
    pub fn all_stats(&self) -> Vec<StatsSnapshot> {
        self.snapshot_breakers()
            .iter()
            .map(|breaker| breaker.stats())
            .collect()
    }

    /// Reset one breaker by name, or every breaker when `name` is `None`.
    ///
    /// Returns the number of breakers reset; an unknown name resets nothing.
    pub fn reset(&self, name: Option<&str>) -> usize {
        match name {
            Some(name) => match self.get(name) {
                Some(breaker) => {
                    breaker.reset();
                    1
                }
                None => {
                    tracing::debug!(breaker = %name, "Reset requested for unknown circuit breaker");
                    0
                }
            },
            None => {
                let breakers = self.snapshot_breakers();
                for breaker in &breakers {
                    breaker.reset();
                }
                breakers.len()
            }
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.breakers.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    /// Forget every breaker.
    pub fn clear(&self) {
        self.breakers.write().clear();
    }

    /// Clone the breaker list so per-breaker locks are taken without
    /// holding the registry lock.
    fn snapshot_breakers(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers.read().values().cloned().collect()
    }
}
