//! # breakwater-core
//!
//! Named circuit breakers for calls to unreliable dependencies (HTTP APIs,
//! databases, caches), and a registry that tracks them for monitoring.
//!
//! ## Key Guarantees
//!
//! 1. **Fail fast**: while a circuit is open the guarded operation is never run
//! 2. **Linearizable bookkeeping**: concurrent calls on one breaker never lose
//!    counter updates or transition twice
//! 3. **No global lock**: each breaker has its own lock; the registry's lock
//!    is separate from all of them
//! 4. **Process-local**: breaker state lives in memory and is never shared or
//!    persisted
//!
//! ## Example
//!
//! ```rust,ignore
//! use breakwater_core::{create_breaker, global, BreakerError};
//!
//! let db = create_breaker("database", 3, 60.0, 2, None)?;
//!
//! match db.call(|| async { pool.fetch_user(42).await }).await {
//!     Ok(user) => render(user),
//!     Err(BreakerError::Open { retry_after, .. }) => unavailable(retry_after),
//!     Err(err) => fail(err),
//! }
//!
//! // Somewhere in a monitoring endpoint
//! let snapshots = global().all_stats();
//! ```

pub mod breaker;
pub mod config;
pub mod error;
pub mod registry;
pub mod state;
pub mod stats;
pub mod wrap;

// Re-export main types at crate root
pub use breaker::{BreakerBuilder, CircuitBreaker, Fallback};
pub use config::{parse_duration, BreakerConfig, BreakerDeclaration, Classifier, RegistryManifest};
pub use error::{BreakerError, ConfigError};
pub use registry::{create_breaker, global, BreakerRegistry};
pub use state::CircuitState;
pub use stats::StatsSnapshot;
pub use wrap::Guarded;
