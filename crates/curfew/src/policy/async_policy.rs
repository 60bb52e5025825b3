// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use crate::engine::{self, TimeoutShared};
use crate::{Cancellation, CancellationToken, Context, Cooperative, NotSet, PolicyOptions, TimeoutBuilder, TimeoutError, TimeoutStrategy};

/// Enforces a timeout on asynchronous actions.
///
/// The asynchronous counterpart of [`TimeoutPolicy`][crate::TimeoutPolicy], with the same
/// semantics. Optimistic executions await the action inside the caller's future. Pessimistic
/// executions run the action through the configured [`Spawner`][crate::Spawner] and stop
/// awaiting it once the deadline passes.
///
/// Asynchronous policies additionally accept an
/// [`on_timeout_async`][TimeoutBuilder::on_timeout_async] hook, awaited before the rejection is
/// returned.
///
/// # Examples
///
/// ```rust
/// # use std::time::Duration;
/// use curfew::{AsyncTimeoutPolicy, Deadlines, PolicyOptions};
///
/// # futures::executor::block_on(async {
/// let deadlines = Deadlines::system();
/// let policy = AsyncTimeoutPolicy::builder("fetch", &PolicyOptions::new().deadlines(deadlines.clone()))
///     .timeout(Duration::from_millis(20))
///     .build()?;
///
/// let result = policy
///     .execute(move |_context, token| async move { deadlines.sleep_async(Duration::from_secs(5), &token).await })
///     .await;
///
/// assert!(result.unwrap_err().is_rejected());
/// # Ok::<(), curfew::ValidationError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct AsyncTimeoutPolicy {
    pub(super) shared: Arc<TimeoutShared>,
}

impl AsyncTimeoutPolicy {
    /// Creates a builder for an asynchronous timeout policy.
    ///
    /// The name identifies the policy in telemetry. Prefer `snake_case`.
    pub fn builder(name: impl Into<Cow<'static, str>>, options: &PolicyOptions) -> TimeoutBuilder<Cooperative, NotSet> {
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
    pub async fn execute<T, E, F, Fut>(&self, action: F) -> Result<T, TimeoutError<E>>
    where
        F: FnOnce(Context, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Cancellation + Send + 'static,
    {
        self.execute_with(&Context::new(), &CancellationToken::none(), action).await
    }

    /// Executes `action` under this policy.
    ///
    /// # Errors
    ///
    /// - [`TimeoutError::Cancelled`] if `token` is already cancelled. The action is not run.
    /// - [`TimeoutError::Rejected`] if the deadline passed before the action completed. Both
    ///   on-timeout hooks have run by the time this is returned.
    /// - [`TimeoutError::Action`] with the action's own error, including a cancellation the
    ///   caller requested while the action ran.
    ///
    /// # Panics
    ///
    /// A panic raised by the action is resumed in the caller's future with its original
    /// payload, unless the action was abandoned first.
    ///
    /// Pessimistic executions on the default spawner also panic if the operating system
    /// refuses to start the worker thread.
    pub async fn execute_with<T, E, F, Fut>(&self, context: &Context, token: &CancellationToken, action: F) -> Result<T, TimeoutError<E>>
    where
        F: FnOnce(Context, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Cancellation + Send + 'static,
    {
        engine::cooperative::run(&self.shared, context, token, action).await
    }
}
