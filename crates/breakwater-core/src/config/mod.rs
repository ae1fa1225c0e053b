//! Breaker configuration and manifest loading.
//!
//! A [`BreakerConfig`] is fixed at construction time. Manifests declare a
//! set of named breakers in YAML or JSON so that operators can tune
//! thresholds without recompiling.

mod breaker;
mod manifest;

pub use breaker::{duration_secs, parse_duration, BreakerConfig, Classifier};
pub use manifest::{BreakerDeclaration, RegistryManifest};
