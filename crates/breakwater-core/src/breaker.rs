//! Circuit breaker guarding calls to one logical dependency.
//!
//! ```text
//!   CLOSED ──(failure_count >= failure_threshold)──► OPEN
//!     ▲                                               │
//!     │                                 timeout elapsed, next call
//!     │                                               ▼
//!     └──(success_count >= success_threshold)──── HALF_OPEN
//!                                                     │
//!   OPEN ◄──────────────(any classified failure)──────┘
//! ```
//!
//! Every call takes the breaker's lock twice: once to decide whether the
//! operation may run (and to perform a due OPEN→HALF_OPEN transition), and
//! once to record its outcome. The operation itself runs with no lock held.

use chrono::Utc;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::error::Elapsed;
use tokio::time::Instant;

use crate::config::{BreakerConfig, Classifier};
use crate::error::{BreakerError, ConfigError};
use crate::registry::BreakerRegistry;
use crate::state::CircuitState;
use crate::stats::{BreakerStats, StatsSnapshot};
use crate::wrap::Guarded;

type FallbackFn<T, E> = Arc<dyn Fn() -> Result<T, E> + Send + Sync>;

/// Substitute outcome for calls rejected while the circuit is open.
///
/// The fallback is typed by the `T`/`E` it was built with; it only applies
/// to calls whose result type matches.
#[derive(Clone)]
pub struct Fallback {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Fallback {
    /// Wrap a fallback function.
    pub fn new<T, E, F>(f: F) -> Self
    where
        T: 'static,
        E: 'static,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let f: FallbackFn<T, E> = Arc::new(f);
        Self { inner: Arc::new(f) }
    }

    fn resolve<T: 'static, E: 'static>(&self) -> Option<&FallbackFn<T, E>> {
        self.inner.downcast_ref::<FallbackFn<T, E>>()
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fallback(..)")
    }
}

/// A named circuit breaker.
///
/// Successes while CLOSED do not forgive earlier failures: `failure_count`
/// only goes back to zero when the circuit (re)enters CLOSED or HALF_OPEN,
/// so the threshold counts failures since the last recovery rather than
/// consecutive failures.
///
/// `total_calls` counts every call, including ones short-circuited while
/// OPEN and ones ending in an unclassified error; `total_failures` and
/// `total_successes` only count recorded outcomes.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    fallback: Option<Fallback>,
    stats: Mutex<BreakerStats>,
}

impl CircuitBreaker {
    /// Create a breaker with the given config and no fallback.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            fallback: None,
            stats: Mutex::new(BreakerStats::default()),
        }
    }

    /// Start building a breaker with default config.
    pub fn builder(name: impl Into<String>) -> BreakerBuilder {
        BreakerBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state. An elapsed OPEN timeout is only acted on by the next call.
    pub fn state(&self) -> CircuitState {
        self.stats.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Time left before a trial call is allowed; zero unless OPEN.
    pub fn time_until_retry(&self) -> Duration {
        let stats = self.stats.lock();
        self.remaining_open(&stats, Instant::now())
    }

    /// Run `operation` through the breaker.
    ///
    /// While OPEN the operation is never invoked: the fallback runs if one
    /// matching this call's types is configured, otherwise the call fails
    /// with [`BreakerError::Open`]. Errors accepted by the classifier are
    /// recorded and returned as [`BreakerError::Failure`]; all others are
    /// returned as [`BreakerError::Unclassified`] without being recorded.
    ///
    /// Dropping the returned future before it completes leaves the call
    /// counted in `total_calls` with no outcome recorded, and an abandoned
    /// HALF_OPEN trial neither closes nor reopens the circuit. Use
    /// [`call_with_timeout`](Self::call_with_timeout) when a deadline should
    /// count as a failure.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: 'static,
        E: 'static,
    {
        if let Err(retry_after) = self.admit() {
            return self.short_circuit(retry_after);
        }

        let outcome = operation().await;
        self.record(outcome)
    }

    /// Like [`call`](Self::call), but an operation running longer than
    /// `limit` fails with `E::from(Elapsed)` and is classified as usual.
    pub async fn call_with_timeout<F, Fut, T, E>(
        &self,
        limit: Duration,
        operation: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: 'static,
        E: From<Elapsed> + 'static,
    {
        self.call(|| async move {
            match tokio::time::timeout(limit, operation()).await {
                Ok(outcome) => outcome,
                Err(elapsed) => Err(E::from(elapsed)),
            }
        })
        .await
    }

    /// Wrap a function so every invocation goes through this breaker.
    pub fn wrap<F>(self: &Arc<Self>, f: F) -> Guarded<F> {
        Guarded::new(Arc::clone(self), f)
    }

    /// Copy of the current state, counters, and config.
    pub fn stats(&self) -> StatsSnapshot {
        let stats = self.stats.lock();
        let retry = self.remaining_open(&stats, Instant::now());

        StatsSnapshot {
            name: self.name.clone(),
            state: stats.state,
            is_open: stats.state == CircuitState::Open,
            time_until_retry: retry.as_secs_f64(),
            failure_count: stats.failure_count,
            success_count: stats.success_count,
            total_calls: stats.total_calls,
            total_failures: stats.total_failures,
            total_successes: stats.total_successes,
            failure_threshold: self.config.failure_threshold,
            timeout_seconds: self.config.timeout_seconds(),
            success_threshold: self.config.success_threshold,
            last_failure_time: stats.last_failure_time,
            last_success_time: stats.last_success_time,
            last_state_change_time: stats.last_state_change_time,
        }
    }

    /// Return to CLOSED and zero every counter, lifetime totals included.
    pub fn reset(&self) {
        let mut stats = self.stats.lock();
        let previous = stats.state;
        *stats = BreakerStats::default();
        tracing::info!(
            breaker = %self.name,
            from = %previous,
            "Circuit breaker manually reset to closed"
        );
    }

    /// Entry critical section. Counts the call and performs a due
    /// OPEN→HALF_OPEN transition; returns the remaining wait if the call
    /// must be short-circuited.
    fn admit(&self) -> Result<(), Duration> {
        let mut stats = self.stats.lock();
        stats.total_calls += 1;

        if stats.state != CircuitState::Open {
            return Ok(());
        }

        let remaining = self.remaining_open(&stats, Instant::now());
        if remaining.is_zero() {
            self.transition(&mut stats, CircuitState::HalfOpen);
            Ok(())
        } else {
            Err(remaining)
        }
    }

    fn short_circuit<T: 'static, E: 'static>(
        &self,
        retry_after: Duration,
    ) -> Result<T, BreakerError<E>> {
        if let Some(fallback) = &self.fallback {
            match fallback.resolve::<T, E>() {
                Some(f) => {
                    tracing::debug!(breaker = %self.name, "Circuit open, using fallback");
                    return f().map_err(|source| BreakerError::Fallback {
                        name: self.name.clone(),
                        source,
                    });
                }
                None => {
                    tracing::warn!(
                        breaker = %self.name,
                        "Circuit open and fallback does not match the call's result type"
                    );
                }
            }
        }

        tracing::debug!(
            breaker = %self.name,
            retry_after = ?retry_after,
            "Circuit open, rejecting call"
        );
        Err(BreakerError::Open {
            name: self.name.clone(),
            retry_after,
        })
    }

    fn record<T, E: 'static>(&self, outcome: Result<T, E>) -> Result<T, BreakerError<E>> {
        match outcome {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) if self.config.classifier.is_failure(&err) => {
                self.on_failure();
                Err(BreakerError::Failure {
                    name: self.name.clone(),
                    source: err,
                })
            }
            Err(err) => Err(BreakerError::Unclassified(err)),
        }
    }

    fn on_success(&self) {
        let mut stats = self.stats.lock();
        stats.success_count += 1;
        stats.total_successes += 1;
        stats.last_success_time = Some(Utc::now());

        if stats.state == CircuitState::HalfOpen
            && stats.success_count >= u64::from(self.config.success_threshold)
        {
            self.transition(&mut stats, CircuitState::Closed);
        }
    }

    fn on_failure(&self) {
        let mut stats = self.stats.lock();
        stats.failure_count += 1;
        stats.total_failures += 1;
        stats.last_failure_time = Some(Utc::now());

        match stats.state {
            CircuitState::Closed
                if stats.failure_count >= u64::from(self.config.failure_threshold) =>
            {
                self.transition(&mut stats, CircuitState::Open);
            }
            CircuitState::HalfOpen => self.transition(&mut stats, CircuitState::Open),
            // Outcome of a call admitted before another caller opened the circuit.
            _ => {}
        }
    }

    /// Apply a state change. Caller holds the lock.
    fn transition(&self, stats: &mut BreakerStats, to: CircuitState) {
        let from = stats.state;
        stats.state = to;
        stats.last_state_change_time = Some(Utc::now());

        match to {
            CircuitState::Open => {
                stats.opened_at = Some(Instant::now());
                tracing::warn!(
                    breaker = %self.name,
                    from = %from,
                    to = %to,
                    failure_count = stats.failure_count,
                    failure_threshold = self.config.failure_threshold,
                    retry_after = ?self.config.timeout,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                stats.clear_window();
                tracing::info!(
                    breaker = %self.name,
                    from = %from,
                    to = %to,
                    "Circuit breaker half-open, allowing trial calls"
                );
            }
            CircuitState::Closed => {
                let successes = stats.success_count;
                stats.clear_window();
                tracing::info!(
                    breaker = %self.name,
                    from = %from,
                    to = %to,
                    success_count = successes,
                    "Circuit breaker closed after successful recovery"
                );
            }
        }
    }

    fn remaining_open(&self, stats: &BreakerStats, now: Instant) -> Duration {
        match (stats.state, stats.opened_at) {
            (CircuitState::Open, Some(opened_at)) => self
                .config
                .timeout
                .saturating_sub(now.saturating_duration_since(opened_at)),
            _ => Duration::ZERO,
        }
    }

    /// Pretend the circuit opened `ago` in the past.
    #[cfg(test)]
    pub(crate) fn backdate_open(&self, ago: Duration) {
        let mut stats = self.stats.lock();
        if let Some(opened_at) = stats.opened_at {
            stats.opened_at = opened_at.checked_sub(ago).or(Some(opened_at));
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &stats.state)
            .field("failure_count", &stats.failure_count)
            .field("success_count", &stats.success_count)
            .field("total_calls", &stats.total_calls)
            .field("config", &self.config)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Fluent construction of a [`CircuitBreaker`].
///
/// ```rust,ignore
/// let api = CircuitBreaker::builder("external_api")
///     .failure_threshold(3)
///     .timeout(Duration::from_secs(30))
///     .fallback(|| Ok::<_, ApiError>(Quote::cached()))
///     .register(breakwater_core::global())?;
/// ```
///
/// The config is validated when the breaker is built.
#[derive(Debug)]
pub struct BreakerBuilder {
    name: String,
    config: BreakerConfig,
    fallback: Option<Fallback>,
}

impl BreakerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: BreakerConfig::default(),
            fallback: None,
        }
    }

    /// Replace the whole config. Call before the individual setters.
    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.config.classifier = classifier;
        self
    }

    pub fn fallback<T, E, F>(mut self, f: F) -> Self
    where
        T: 'static,
        E: 'static,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.fallback = Some(Fallback::new(f));
        self
    }

    /// Use an already wrapped fallback, or none.
    pub fn with_fallback(mut self, fallback: Option<Fallback>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn build(self) -> Result<Arc<CircuitBreaker>, ConfigError> {
        self.config
            .validate()
            .map_err(|err| match err {
                ConfigError::Validation(msg) => {
                    ConfigError::Validation(format!("breaker '{}': {}", self.name, msg))
                }
                other => other,
            })?;

        let mut breaker = CircuitBreaker::new(self.name, self.config);
        breaker.fallback = self.fallback;
        Ok(Arc::new(breaker))
    }

    /// Build and track the breaker in `registry`.
    pub fn register(
        self,
        registry: &BreakerRegistry,
    ) -> Result<Arc<CircuitBreaker>, ConfigError> {
        let breaker = self.build()?;
        registry.register(Arc::clone(&breaker));
        Ok(breaker)
    }
}
