// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use crate::engine::{self, TimeoutShared};
use crate::{Blocking, Cancellation, CancellationToken, Context, NotSet, PolicyOptions, TimeoutBuilder, TimeoutError, TimeoutStrategy};

/// Enforces a timeout on blocking actions.
///
/// The action receives the execution's [`Context`] and a [`CancellationToken`] that is
/// cancelled when the deadline passes or the caller's token is cancelled. How the deadline is
/// enforced depends on the [`TimeoutStrategy`]:
///
/// - **Optimistic** runs the action on the calling thread and relies on it to return a
///   [`Cancelled`][crate::Cancelled] error once its token fires.
/// - **Pessimistic** runs the action on a dedicated worker thread and returns to the caller as
///   soon as the deadline passes. The worker is abandoned, not stopped.
///
/// A policy is cheap to clone, and clones share their configuration. A single policy may run
/// any number of executions concurrently.
///
/// # Examples
///
/// ```rust
/// # use std::time::Duration;
/// use curfew::{PolicyOptions, TimeoutError, TimeoutPolicy};
///
/// let policy = TimeoutPolicy::builder("read_config", &PolicyOptions::new())
///     .timeout(Duration::from_millis(50))
///     .pessimistic()
///     .build()?;
///
/// let result: Result<(), TimeoutError<std::io::Error>> = policy.execute(|_context, _token| {
///     std::thread::sleep(Duration::from_secs(1));
///     Ok(())
/// });
///
/// assert!(result.unwrap_err().is_rejected());
/// # Ok::<(), curfew::ValidationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    pub(super) shared: Arc<TimeoutShared>,
}

impl TimeoutPolicy {
    /// Creates a builder for a timeout policy.
    ///
    /// The name identifies the policy in telemetry. Prefer `snake_case`.
    pub fn builder(name: impl Into<Cow<'static, str>>, options: &PolicyOptions) -> TimeoutBuilder<Blocking, NotSet> {
        TimeoutBuilder::new(name.into(), options)
    }

    /// Returns the name of this policy.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns the strategy this policy enforces timeouts with.
    #[must_use]
    pub fn strategy(&self) -> TimeoutStrategy {
        self.shared.strategy
    }

    /// Executes `action` with a fresh [`Context`] and no caller cancellation.
    ///
    /// # Errors
    ///
    /// See [`execute_with`][Self::execute_with].
    pub fn execute<T, E, F>(&self, action: F) -> Result<T, TimeoutError<E>>
    where
        F: FnOnce(&Context, CancellationToken) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Cancellation + Send + 'static,
    {
        self.execute_with(&Context::new(), &CancellationToken::none(), action)
    }

    /// Executes `action` under this policy.
    ///
    /// # Errors
    ///
    /// - [`TimeoutError::Cancelled`] if `token` is already cancelled. The action is not run.
    /// - [`TimeoutError::Rejected`] if the deadline passed before the action completed. The
    ///   on-timeout hook has run by the time this is returned.
    /// - [`TimeoutError::Action`] with the action's own error, including a cancellation the
    ///   caller requested while the action ran.
    ///
    /// # Panics
    ///
    /// A panic raised by the action is resumed on the calling thread with its original
    /// payload, unless the action was abandoned first. The panic of an abandoned action is
    /// delivered to its [`AbandonedAction`][crate::AbandonedAction] instead.
    ///
    /// Pessimistic executions also panic if the operating system refuses to start the worker
    /// thread.
    pub fn execute_with<T, E, F>(&self, context: &Context, token: &CancellationToken, action: F) -> Result<T, TimeoutError<E>>
    where
        F: FnOnce(&Context, CancellationToken) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Cancellation + Send + 'static,
    {
        engine::blocking::run(&self.shared, context, token, action)
    }
}
