//! Per-breaker configuration.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;

/// Decides whether an operation error counts as a circuit failure.
///
/// Errors the classifier rejects are handed back to the caller untouched
/// and leave the breaker's counters alone. The predicate sees the error as
/// `&dyn Any` so one classifier works for every call regardless of its
/// error type.
#[derive(Clone)]
pub struct Classifier {
    predicate: Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>,
}

impl Classifier {
    /// Every error is a failure.
    pub fn all() -> Self {
        Self::new(|_| true)
    }

    /// Classify with an arbitrary predicate over the type-erased error.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&dyn Any) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Only errors of type `T` are failures.
    pub fn only<T: 'static>() -> Self {
        Self::new(|err| err.is::<T>())
    }

    /// Errors of type `T` for which `predicate` holds are failures.
    ///
    /// Errors of any other type are not.
    pub fn when<T, F>(predicate: F) -> Self
    where
        T: 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::new(move |err| err.downcast_ref::<T>().is_some_and(&predicate))
    }

    /// Evaluate the classifier against an error.
    pub fn is_failure<E: 'static>(&self, err: &E) -> bool {
        (self.predicate)(err as &dyn Any)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Classifier(..)")
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Failures while closed before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Successes while half-open before the circuit closes
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Time the circuit stays open before a trial call is allowed
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    /// Which errors count toward `failure_threshold`
    #[serde(skip)]
    pub classifier: Classifier,
}

pub(crate) fn default_failure_threshold() -> u32 {
    5
}

pub(crate) fn default_success_threshold() -> u32 {
    2
}

pub(crate) fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout: default_timeout(),
            classifier: Classifier::default(),
        }
    }
}

impl BreakerConfig {
    /// Create a config from the three numeric knobs.
    ///
    /// `timeout_seconds` may be fractional.
    pub fn new(
        failure_threshold: u32,
        timeout_seconds: f64,
        success_threshold: u32,
    ) -> Result<Self, ConfigError> {
        let timeout = Duration::try_from_secs_f64(timeout_seconds).map_err(|_| {
            ConfigError::InvalidDuration(format!("{} seconds", timeout_seconds))
        })?;

        let config = Self {
            failure_threshold,
            success_threshold,
            timeout,
            classifier: Classifier::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Replace the failure classifier.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Check that thresholds and timeout are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Validation(
                "failure_threshold must be > 0".to_string(),
            ));
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::Validation(
                "success_threshold must be > 0".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Validation("timeout must be > 0".to_string()));
        }
        Ok(())
    }

    /// Timeout expressed in fractional seconds, as reported in snapshots.
    pub fn timeout_seconds(&self) -> f64 {
        self.timeout.as_secs_f64()
    }
}

/// Parse a duration from plain seconds (`"30"`, `"0.5"`) or humantime (`"1m 30s"`).
pub fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<f64>() {
        return Duration::try_from_secs_f64(secs)
            .map_err(|_| ConfigError::InvalidDuration(text.to_string()));
    }
    humantime::parse_duration(text)
        .map_err(|e| ConfigError::InvalidDuration(format!("{}: {}", text, e)))
}

/// Serde adapter: durations as float seconds, accepting humantime strings on input.
pub mod duration_secs {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(f64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawDuration::deserialize(deserializer)? {
            RawDuration::Seconds(secs) => Duration::try_from_secs_f64(secs)
                .map_err(|_| de::Error::custom(format!("invalid duration: {} seconds", secs))),
            RawDuration::Text(text) => super::parse_duration(&text).map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_defaults() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_accepts_fractional_timeout() {
        let config = BreakerConfig::new(3, 0.25, 1).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.timeout_seconds(), 0.25);
    }

    #[test]
    fn test_new_rejects_bad_values() {
        assert!(matches!(
            BreakerConfig::new(0, 60.0, 2),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            BreakerConfig::new(3, 60.0, 0),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            BreakerConfig::new(3, 0.0, 2),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            BreakerConfig::new(3, -1.0, 2),
            Err(ConfigError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_default_classifier_counts_everything() {
        let classifier = Classifier::default();
        assert!(classifier.is_failure(&io::Error::other("boom")));
        assert!(classifier.is_failure(&"plain string"));
    }

    #[test]
    fn test_typed_classifiers() {
        let only_io = Classifier::only::<io::Error>();
        assert!(only_io.is_failure(&io::Error::other("boom")));
        assert!(!only_io.is_failure(&"not io"));

        let timeouts = Classifier::when(|err: &io::Error| err.kind() == io::ErrorKind::TimedOut);
        assert!(timeouts.is_failure(&io::Error::new(io::ErrorKind::TimedOut, "slow")));
        assert!(!timeouts.is_failure(&io::Error::new(io::ErrorKind::NotFound, "missing")));
        assert!(!timeouts.is_failure(&42_u32));
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1.5").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("1m 30s").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_deserialize_timeout_variants() {
        let config: BreakerConfig = serde_yaml::from_str("timeout: 2m").unwrap();
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.failure_threshold, 5);

        let config: BreakerConfig = serde_json::from_str(r#"{"timeout": 0.5}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(500));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["timeout"], serde_json::json!(0.5));
    }
}
