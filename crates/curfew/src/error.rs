// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::convert::Infallible;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::{CancellationToken, TimeoutDuration, TimeoutStrategy};

/// A timeout configuration was rejected while building a policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The timeout is neither positive nor infinite.
    #[error("timeout must be positive or infinite, got {0:?}")]
    OutOfRange(Duration),

    /// The timeout, expressed in seconds, is not positive.
    #[error("timeout in seconds must be positive, got {0}")]
    SecondsOutOfRange(i64),
}

/// An operation stopped because cancellation was requested.
///
/// The error remembers the token it was observed on. Code that combines tokens further may
/// report a token other than the one whose owner requested cancellation, so the token is
/// informational and must not be used to decide *why* the operation stopped.
#[derive(Debug, Clone, Error)]
#[error("the operation was canceled")]
pub struct Cancelled {
    token: CancellationToken,
}

impl Cancelled {
    /// Creates a cancellation error observed on `token`.
    #[must_use]
    pub fn new(token: &CancellationToken) -> Self {
        Self { token: token.clone() }
    }

    /// Returns the token on which the cancellation was observed.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// The action did not complete before its deadline.
///
/// Returned exactly once per timed-out execution. The [`source`][std::error::Error::source]
/// is the [`Cancelled`] error that triggered the rejection.
#[derive(Debug, Clone, Error)]
#[error("the action executed through the timeout policy did not complete within the timeout")]
pub struct TimeoutRejected {
    timeout: TimeoutDuration,
    strategy: TimeoutStrategy,
    #[source]
    cause: Cancelled,
}

impl TimeoutRejected {
    pub(crate) fn new(timeout: TimeoutDuration, strategy: TimeoutStrategy, cause: Cancelled) -> Self {
        Self { timeout, strategy, cause }
    }

    /// Returns the timeout that was exceeded.
    #[must_use]
    pub fn timeout(&self) -> TimeoutDuration {
        self.timeout
    }

    /// Returns the strategy that enforced the timeout.
    #[must_use]
    pub fn strategy(&self) -> TimeoutStrategy {
        self.strategy
    }

    /// Returns the cancellation that triggered the rejection.
    #[must_use]
    pub fn cause(&self) -> &Cancelled {
        &self.cause
    }
}

/// The failure side of an execution through a timeout policy.
///
/// Exactly one of the variants (or a successful result) is observed per execution.
#[derive(Debug, Error)]
pub enum TimeoutError<E> {
    /// The deadline passed before the action completed.
    #[error(transparent)]
    Rejected(TimeoutRejected),

    /// The caller's token was cancelled before the action started.
    #[error(transparent)]
    Cancelled(Cancelled),

    /// The action completed with its own error.
    #[error(transparent)]
    Action(E),
}

impl<E> TimeoutError<E> {
    /// Returns `true` if the deadline ended the execution.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Returns the rejection, if the deadline ended the execution.
    #[must_use]
    pub fn rejected(&self) -> Option<&TimeoutRejected> {
        match self {
            Self::Rejected(rejected) => Some(rejected),
            _ => None,
        }
    }

    /// Returns the action's own error, if it completed with one.
    #[must_use]
    pub fn into_action(self) -> Option<E> {
        match self {
            Self::Action(error) => Some(error),
            _ => None,
        }
    }
}

impl<E: Cancellation> TimeoutError<E> {
    /// Returns `true` for ordinary cancellation: either the caller's token was cancelled up
    /// front, or the action stopped with a cancellation of its own.
    ///
    /// A rejection is never an ordinary cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.as_cancelled().is_some()
    }
}

/// Classifies errors that represent cooperative cancellation.
///
/// Timeout policies use this to recognise when an action stopped because its token was
/// cancelled. Implement it for action error types that can carry a [`Cancelled`] error.
///
/// # Examples
///
/// ```rust
/// use curfew::{Cancellation, Cancelled};
///
/// #[derive(Debug)]
/// enum FetchError {
///     Cancelled(Cancelled),
///     NotFound,
/// }
///
/// impl Cancellation for FetchError {
///     fn as_cancelled(&self) -> Option<&Cancelled> {
///         match self {
///             Self::Cancelled(cancelled) => Some(cancelled),
///             Self::NotFound => None,
///         }
///     }
/// }
/// ```
pub trait Cancellation {
    /// Returns the cancellation this error represents, if any.
    fn as_cancelled(&self) -> Option<&Cancelled>;
}

impl Cancellation for Cancelled {
    fn as_cancelled(&self) -> Option<&Cancelled> {
        Some(self)
    }
}

impl<E: Cancellation> Cancellation for TimeoutError<E> {
    fn as_cancelled(&self) -> Option<&Cancelled> {
        match self {
            Self::Rejected(_) => None,
            Self::Cancelled(cancelled) => Some(cancelled),
            Self::Action(error) => error.as_cancelled(),
        }
    }
}

impl Cancellation for Box<dyn std::error::Error + Send + Sync> {
    fn as_cancelled(&self) -> Option<&Cancelled> {
        self.downcast_ref::<Cancelled>()
    }
}

impl Cancellation for io::Error {
    fn as_cancelled(&self) -> Option<&Cancelled> {
        self.get_ref().and_then(|inner| inner.downcast_ref::<Cancelled>())
    }
}

impl Cancellation for Infallible {
    fn as_cancelled(&self) -> Option<&Cancelled> {
        match *self {}
    }
}

impl From<Cancelled> for io::Error {
    fn from(cancelled: Cancelled) -> Self {
        Self::new(io::ErrorKind::Interrupted, cancelled)
    }
}

impl From<TimeoutRejected> for io::Error {
    fn from(rejected: TimeoutRejected) -> Self {
        Self::new(io::ErrorKind::TimedOut, rejected)
    }
}
