//! Ordered first-success evaluation over named strategies.
//!
//! Acquisition providers and extraction methods are both expressed as a
//! list of [`Strategy`] values; [`first_success`] runs them in order and
//! stops at the first one that succeeds.

use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};

/// One way of turning an input into an output.
#[async_trait]
pub trait Strategy<I, O, E>: Send + Sync
where
    I: Sync + ?Sized,
{
    /// Stable name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Attempt the strategy once.
    async fn attempt(&self, input: &I) -> Result<O, E>;
}

/// A single recorded strategy failure.
#[derive(Debug)]
pub struct StrategyFailure<E> {
    pub strategy: &'static str,
    pub error: E,
}

/// The winning strategy, its output, and the failures that preceded it.
#[derive(Debug)]
pub struct StrategySuccess<O, E> {
    pub strategy: &'static str,
    pub output: O,
    pub failures: Vec<StrategyFailure<E>>,
}

/// Every failure of an exhausted strategy list, in evaluation order.
#[derive(Debug)]
pub struct StrategyFailures<E> {
    pub failures: Vec<StrategyFailure<E>>,
}

impl<E> StrategyFailures<E> {
    /// True when no strategy was configured.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure of the last strategy tried.
    pub fn last(&self) -> Option<&StrategyFailure<E>> {
        self.failures.last()
    }

    /// Names of the strategies that were tried.
    pub fn attempted(&self) -> Vec<&'static str> {
        self.failures.iter().map(|f| f.strategy).collect()
    }
}

impl<E: fmt::Display> fmt::Display for StrategyFailures<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "no strategies configured");
        }
        let parts: Vec<String> = self
            .failures
            .iter()
            .map(|failure| format!("{}: {}", failure.strategy, failure.error))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Run `strategies` in order and return the first success, tagged with the
/// winning strategy's name.
///
/// Failures of strategies tried before the winner are logged and handed
/// back in [`StrategySuccess::failures`].
pub async fn first_success<I, O, E>(
    strategies: &[Box<dyn Strategy<I, O, E>>],
    input: &I,
) -> Result<StrategySuccess<O, E>, StrategyFailures<E>>
where
    I: Sync + ?Sized,
    E: fmt::Display,
{
    let mut failures = Vec::new();

    for strategy in strategies {
        let name = strategy.name();
        debug!(strategy = name, "Trying strategy");
        match strategy.attempt(input).await {
            Ok(output) => {
                if !failures.is_empty() {
                    debug!(
                        strategy = name,
                        failed_before = failures.len(),
                        "Strategy succeeded after earlier failures"
                    );
                }
                return Ok(StrategySuccess {
                    strategy: name,
                    output,
                    failures,
                });
            }
            Err(error) => {
                warn!(strategy = name, error = %error, "Strategy failed");
                failures.push(StrategyFailure {
                    strategy: name,
                    error,
                });
            }
        }
    }

    Err(StrategyFailures { failures })
}
