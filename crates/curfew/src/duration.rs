// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display};
use std::time::Duration;

use crate::ValidationError;

/// The time budget granted to a single execution.
///
/// A timeout is either a finite span or [`TimeoutDuration::Infinite`], which disables
/// enforcement: no deadline is armed and the action runs for as long as it needs.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use curfew::TimeoutDuration;
///
/// let timeout = TimeoutDuration::from(Duration::from_millis(250));
/// assert_eq!(timeout.as_duration(), Some(Duration::from_millis(250)));
/// assert!(TimeoutDuration::Infinite.is_infinite());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutDuration {
    /// The action must complete within the given span.
    Finite(Duration),

    /// The action is never timed out.
    Infinite,
}

impl TimeoutDuration {
    /// Creates a finite timeout of the given number of seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self::Finite(Duration::from_secs(secs))
    }

    /// Creates a finite timeout of the given number of milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self::Finite(Duration::from_millis(millis))
    }

    /// Returns the finite span, or `None` for [`TimeoutDuration::Infinite`].
    #[must_use]
    pub const fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Finite(duration) => Some(*duration),
            Self::Infinite => None,
        }
    }

    /// Returns `true` if this timeout never fires.
    #[must_use]
    pub const fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }
}

impl From<Duration> for TimeoutDuration {
    fn from(duration: Duration) -> Self {
        Self::Finite(duration)
    }
}

impl Display for TimeoutDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(duration) => write!(f, "{}ms", duration.as_millis()),
            Self::Infinite => f.write_str("infinite"),
        }
    }
}

/// Validates a constant timeout.
///
/// # Errors
///
/// Returns [`ValidationError::OutOfRange`] when the timeout is finite and zero.
pub fn validate_timeout(timeout: impl Into<TimeoutDuration>) -> Result<TimeoutDuration, ValidationError> {
    match timeout.into() {
        TimeoutDuration::Finite(duration) if duration.is_zero() => Err(ValidationError::OutOfRange(duration)),
        timeout => Ok(timeout),
    }
}

/// Validates a constant timeout expressed in whole seconds.
///
/// # Errors
///
/// Returns [`ValidationError::SecondsOutOfRange`] when `seconds` is not positive.
pub fn validate_timeout_secs(seconds: i64) -> Result<TimeoutDuration, ValidationError> {
    u64::try_from(seconds)
        .ok()
        .filter(|secs| *secs > 0)
        .map(TimeoutDuration::from_secs)
        .ok_or(ValidationError::SecondsOutOfRange(seconds))
}
