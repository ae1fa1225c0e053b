//! Decorator-style wrapping of functions with a breaker.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::breaker::CircuitBreaker;
use crate::error::BreakerError;

/// A function bound to a breaker.
///
/// `guarded.call(args)` behaves exactly like
/// `breaker.call(|| f(args))`. Functions of several arguments take a tuple.
///
/// ```rust,ignore
/// let fetch_user = breaker.wrap(|id: u64| async move { api.fetch_user(id).await });
/// let user = fetch_user.call(42).await?;
/// ```
pub struct Guarded<F> {
    breaker: Arc<CircuitBreaker>,
    f: F,
}

impl<F> Guarded<F> {
    pub fn new(breaker: Arc<CircuitBreaker>, f: F) -> Self {
        Self { breaker, f }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Invoke the wrapped function through the breaker.
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, BreakerError<E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: 'static,
        E: 'static,
    {
        self.breaker.call(|| (self.f)(args)).await
    }
}

impl<F: Clone> Clone for Guarded<F> {
    fn clone(&self) -> Self {
        Self {
            breaker: Arc::clone(&self.breaker),
            f: self.f.clone(),
        }
    }
}

impl<F> fmt::Debug for Guarded<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guarded")
            .field("breaker", &self.breaker.name())
            .finish_non_exhaustive()
    }
}
