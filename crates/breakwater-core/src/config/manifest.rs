//! Breaker manifests from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::breaker::{
    default_failure_threshold, default_success_threshold, default_timeout, duration_secs,
};
use super::BreakerConfig;
use crate::breaker::CircuitBreaker;
use crate::error::ConfigError;
use crate::registry::BreakerRegistry;

/// One named breaker in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BreakerDeclaration {
    /// Registry key (e.g., "external_api", "database")
    pub name: String,

    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

impl BreakerDeclaration {
    /// Build the runtime config for this declaration.
    pub fn to_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout: self.timeout,
            ..BreakerConfig::default()
        }
    }
}

/// A set of breaker declarations.
///
/// ```yaml
/// breakers:
///   - name: external_api
///     failure_threshold: 3
///     timeout: 30s
///   - name: database
///     timeout: 60
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistryManifest {
    #[serde(default)]
    pub breakers: Vec<BreakerDeclaration>,
}

impl RegistryManifest {
    /// Parse a manifest from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let manifest: RegistryManifest = serde_yaml::from_str(yaml)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a manifest from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let manifest: RegistryManifest = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load a manifest file. `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Look up a declaration by name.
    pub fn get(&self, name: &str) -> Option<&BreakerDeclaration> {
        self.breakers.iter().find(|b| b.name == name)
    }

    /// Validate every declaration and reject duplicate names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();

        for declaration in &self.breakers {
            if declaration.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "breaker name must not be empty".to_string(),
                ));
            }

            if !seen.insert(declaration.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate breaker name: {}",
                    declaration.name
                )));
            }

            declaration.to_config().validate().map_err(|e| match e {
                ConfigError::Validation(msg) => {
                    ConfigError::Validation(format!("{}: {}", declaration.name, msg))
                }
                other => other,
            })?;
        }

        Ok(())
    }

    /// Create every declared breaker and register it.
    ///
    /// Stops at the first invalid declaration; breakers before it stay registered.
    pub fn register_all(
        &self,
        registry: &BreakerRegistry,
    ) -> Result<Vec<Arc<CircuitBreaker>>, ConfigError> {
        self.breakers
            .iter()
            .map(|declaration| {
                CircuitBreaker::builder(&declaration.name)
                    .config(declaration.to_config())
                    .register(registry)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
breakers:
  - name: external_api
    failure_threshold: 3
    success_threshold: 2
    timeout: 30s
  - name: database
    timeout: 60
  - name: cache
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = RegistryManifest::from_yaml(MANIFEST).unwrap();
        assert_eq!(manifest.breakers.len(), 3);

        let api = manifest.get("external_api").unwrap();
        assert_eq!(api.failure_threshold, 3);
        assert_eq!(api.timeout, Duration::from_secs(30));

        let cache = manifest.get("cache").unwrap();
        assert_eq!(cache.failure_threshold, 5);
        assert_eq!(cache.success_threshold, 2);
        assert_eq!(cache.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = r#"
breakers:
  - name: database
  - name: database
"#;
        assert!(matches!(
            RegistryManifest::from_yaml(yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_threshold_names_breaker() {
        let json = r#"{"breakers": [{"name": "cache", "failure_threshold": 0}]}"#;
        match RegistryManifest::from_json(json) {
            Err(ConfigError::Validation(msg)) => assert!(msg.starts_with("cache:")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
breakers:
  - name: database
    treshold: 3
"#;
        assert!(matches!(
            RegistryManifest::from_yaml(yaml),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_register_all() {
        let registry = BreakerRegistry::new();
        let manifest = RegistryManifest::from_yaml(MANIFEST).unwrap();

        let breakers = manifest.register_all(&registry).unwrap();

        assert_eq!(breakers.len(), 3);
        assert_eq!(registry.names(), vec!["cache", "database", "external_api"]);
        let api = registry.get("external_api").unwrap();
        assert_eq!(api.config().failure_threshold, 3);
    }
}
