// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

use crate::{TimeoutDuration, TimeoutStrategy};

/// Serializable timeout settings, applied with
/// [`TimeoutBuilder::config`][crate::TimeoutBuilder::config].
///
/// A missing `timeout_ms` means the timeout is infinite. A missing `strategy` means
/// [`TimeoutStrategy::Optimistic`]. A zero `timeout_ms` is rejected when the policy is built.
///
/// # Examples
///
/// ```rust
/// use curfew::{PolicyOptions, TimeoutConfig, TimeoutPolicy, TimeoutStrategy};
///
/// let config: TimeoutConfig = serde_json::from_str(r#"{ "timeout_ms": 500, "strategy": "pessimistic" }"#)?;
/// assert_eq!(config.strategy, TimeoutStrategy::Pessimistic);
///
/// let policy = TimeoutPolicy::builder("configured", &PolicyOptions::new()).config(&config).build()?;
/// assert_eq!(policy.strategy(), TimeoutStrategy::Pessimistic);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct TimeoutConfig {
    /// The timeout in milliseconds, or `None` for no timeout.
    pub timeout_ms: Option<u64>,

    /// How the timeout is enforced.
    pub strategy: TimeoutStrategy,
}

impl TimeoutConfig {
    /// Creates settings for the given timeout and strategy.
    #[must_use]
    pub fn new(timeout_ms: Option<u64>, strategy: TimeoutStrategy) -> Self {
        Self { timeout_ms, strategy }
    }

    /// Returns the configured timeout.
    #[must_use]
    pub fn timeout(&self) -> TimeoutDuration {
        self.timeout_ms.map_or(TimeoutDuration::Infinite, TimeoutDuration::from_millis)
    }
}
