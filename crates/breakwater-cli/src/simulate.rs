//! Drive a synthetic dependency through a breaker.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use breakwater_core::{BreakerError, CircuitBreaker, StatsSnapshot};

/// One step of a simulation pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Succeed,
    Fail,
    Ignore,
    Wait,
}

#[derive(Error, Debug, PartialEq)]
pub enum PatternError {
    #[error("unknown step '{0}' at position {1} (expected one of s, f, i, .)")]
    UnknownStep(char, usize),

    #[error("pattern is empty")]
    Empty,
}

/// Parse a pattern such as `"fff..s s"`; whitespace is ignored.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Step>, PatternError> {
    let steps = pattern
        .chars()
        .enumerate()
        .filter(|(_, c)| !c.is_whitespace())
        .map(|(pos, c)| match c {
            's' | 'S' => Ok(Step::Succeed),
            'f' | 'F' => Ok(Step::Fail),
            'i' | 'I' => Ok(Step::Ignore),
            '.' => Ok(Step::Wait),
            other => Err(PatternError::UnknownStep(other, pos)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if steps.is_empty() {
        return Err(PatternError::Empty);
    }
    Ok(steps)
}

/// Errors returned by the synthetic dependency.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedError {
    /// Counts toward the failure threshold
    #[error("dependency unavailable")]
    Down,

    /// Caller's fault; the breaker ignores it
    #[error("request rejected by dependency")]
    Rejected,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    Failure,
    Unclassified,
    ShortCircuited { retry_after: f64 },
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub calls: Vec<CallOutcome>,
    pub stats: StatsSnapshot,
}

/// Run every step against `breaker`, sleeping `tick` on each wait step.
pub async fn run(
    breaker: &Arc<CircuitBreaker>,
    steps: &[Step],
    tick: Duration,
) -> SimulationReport {
    let mut calls = Vec::new();

    for step in steps {
        let outcome = match step {
            Step::Wait => {
                tokio::time::sleep(tick).await;
                continue;
            }
            Step::Succeed => breaker.call(|| async { Ok::<(), SimulatedError>(()) }).await,
            Step::Fail => {
                breaker
                    .call(|| async { Err::<(), _>(SimulatedError::Down) })
                    .await
            }
            Step::Ignore => {
                breaker
                    .call(|| async { Err::<(), _>(SimulatedError::Rejected) })
                    .await
            }
        };

        let outcome = match outcome {
            Ok(()) => CallOutcome::Success,
            Err(BreakerError::Open { retry_after, .. }) => CallOutcome::ShortCircuited {
                retry_after: retry_after.as_secs_f64(),
            },
            Err(BreakerError::Failure { .. }) | Err(BreakerError::Fallback { .. }) => {
                CallOutcome::Failure
            }
            Err(BreakerError::Unclassified(_)) => CallOutcome::Unclassified,
        };
        tracing::debug!(step = ?step, outcome = ?outcome, "Simulated call finished");
        calls.push(outcome);
    }

    SimulationReport {
        calls,
        stats: breaker.stats(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breakwater_core::{CircuitState, Classifier};

    fn breaker() -> Arc<CircuitBreaker> {
        CircuitBreaker::builder("sim")
            .failure_threshold(2)
            .success_threshold(1)
            .timeout(Duration::from_secs(1))
            .classifier(Classifier::when(|e: &SimulatedError| *e == SimulatedError::Down))
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_pattern() {
        assert_eq!(
            parse_pattern("sf i.").unwrap(),
            vec![Step::Succeed, Step::Fail, Step::Ignore, Step::Wait]
        );
        assert_eq!(parse_pattern("   "), Err(PatternError::Empty));
        assert_eq!(parse_pattern("sx"), Err(PatternError::UnknownStep('x', 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle() {
        let cb = breaker();
        let steps = parse_pattern("iff f . s").unwrap();

        let report = run(&cb, &steps, Duration::from_secs(1)).await;

        assert_eq!(report.calls[0], CallOutcome::Unclassified);
        assert_eq!(report.calls[1], CallOutcome::Failure);
        assert_eq!(report.calls[2], CallOutcome::Failure);
        assert!(matches!(report.calls[3], CallOutcome::ShortCircuited { .. }));
        assert_eq!(report.calls[4], CallOutcome::Success);
        assert_eq!(report.stats.state, CircuitState::Closed);
        assert_eq!(report.stats.total_calls, 5);
    }
}
