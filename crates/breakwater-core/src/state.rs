//! Lifecycle states of a circuit breaker.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through
    #[default]
    Closed,

    /// Calls are rejected without touching the dependency
    Open,

    /// Trial period, calls pass through to test recovery
    HalfOpen,
}

impl CircuitState {
    /// Wire name used in stats snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closed" => Ok(CircuitState::Closed),
            "open" => Ok(CircuitState::Open),
            "half_open" => Ok(CircuitState::HalfOpen),
            other => Err(format!("unknown circuit state: '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            "\"half_open\""
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!("open".parse::<CircuitState>(), Ok(CircuitState::Open));
        assert!("HALF_OPEN".parse::<CircuitState>().is_err());
    }
}
