// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use super::{AsyncTimeoutPolicy, OnAbandoned, OnAbandonedArgs, OnTimeout, OnTimeoutArgs, OnTimeoutAsync, TimeoutPolicy, TimeoutProvider};
use crate::engine::{TimeoutShared, TimeoutSource};
use crate::utils::TelemetryHelper;
use crate::{
    AbandonedOutcome, Blocking, Context, Cooperative, Deadlines, NotSet, PolicyOptions, Set, Spawner, TimeoutDuration, TimeoutStrategy,
    ValidationError, validate_timeout, validate_timeout_secs,
};

/// Builder for configuring timeout policies.
///
/// Created by [`TimeoutPolicy::builder`] or [`AsyncTimeoutPolicy::builder`]. The builder uses
/// the type-state pattern: a timeout must be configured, with [`timeout`][Self::timeout],
/// [`timeout_secs`][Self::timeout_secs], [`infinite`][Self::infinite] or
/// [`timeout_provider`][Self::timeout_provider], before the policy can be built.
///
/// # Type State
///
/// - `M`: [`Blocking`] or [`Cooperative`], the kind of policy being built
/// - `S`: tracks whether a timeout has been configured
///
/// # Defaults
///
/// | Parameter | Default Value | Configured By |
/// |-----------|---------------|---------------|
/// | Timeout | `None` (required) | [`timeout`][Self::timeout], [`timeout_secs`][Self::timeout_secs], [`infinite`][Self::infinite], [`timeout_provider`][Self::timeout_provider] |
/// | Strategy | [`TimeoutStrategy::Optimistic`] | [`strategy`][Self::strategy], [`optimistic`][Self::optimistic], [`pessimistic`][Self::pessimistic] |
/// | On timeout hook | `None` | [`on_timeout`][Self::on_timeout] |
/// | On abandoned hook | `None` | [`on_abandoned`][Self::on_abandoned] |
#[derive(Debug)]
pub struct TimeoutBuilder<M, S = Set> {
    name: Cow<'static, str>,
    deadlines: Deadlines,
    spawner: Spawner,
    timeout: Option<TimeoutSetting>,
    strategy: TimeoutStrategy,
    on_timeout: Option<OnTimeout>,
    on_timeout_async: Option<OnTimeoutAsync>,
    on_abandoned: Option<OnAbandoned>,
    telemetry: TelemetryHelper,
    _state: PhantomData<fn(M, S)>,
}

/// A timeout as configured, validated only when the policy is built.
#[derive(Debug)]
enum TimeoutSetting {
    Duration(TimeoutDuration),
    Seconds(i64),
    Provider(TimeoutProvider),
}

impl<M> TimeoutBuilder<M, NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, options: &PolicyOptions) -> Self {
        Self {
            telemetry: options.create_telemetry(name.clone()),
            name,
            deadlines: options.get_deadlines().clone(),
            spawner: options.get_spawner().clone(),
            timeout: None,
            strategy: TimeoutStrategy::default(),
            on_timeout: None,
            on_timeout_async: None,
            on_abandoned: None,
            _state: PhantomData,
        }
    }
}

impl<M, S> TimeoutBuilder<M, S> {
    /// Sets a constant timeout.
    ///
    /// A zero duration is rejected when the policy is built. This call replaces any previous
    /// timeout or provider.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> TimeoutBuilder<M, Set> {
        self.timeout = Some(TimeoutSetting::Duration(TimeoutDuration::Finite(timeout)));
        self.into_state()
    }

    /// Sets a constant timeout in whole seconds.
    ///
    /// A value that is not positive is rejected when the policy is built. This call replaces any
    /// previous timeout or provider.
    #[must_use]
    pub fn timeout_secs(mut self, seconds: i64) -> TimeoutBuilder<M, Set> {
        self.timeout = Some(TimeoutSetting::Seconds(seconds));
        self.into_state()
    }

    /// Disables the timeout: no deadline is armed and actions run to completion.
    #[must_use]
    pub fn infinite(mut self) -> TimeoutBuilder<M, Set> {
        self.timeout = Some(TimeoutSetting::Duration(TimeoutDuration::Infinite));
        self.into_state()
    }

    /// Resolves the timeout separately for every execution.
    ///
    /// The provider receives the execution's [`Context`]. Its results are not validated: a
    /// zero duration times out immediately. This call replaces any previous timeout or
    /// provider.
    #[must_use]
    pub fn timeout_provider(mut self, provider: impl Fn(&Context) -> TimeoutDuration + Send + Sync + 'static) -> TimeoutBuilder<M, Set> {
        self.timeout = Some(TimeoutSetting::Provider(TimeoutProvider::new(provider)));
        self.into_state()
    }

    /// Sets how the timeout is enforced.
    ///
    /// **Default**: [`TimeoutStrategy::Optimistic`]
    #[must_use]
    pub fn strategy(mut self, strategy: TimeoutStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Trusts actions to observe their cancellation token.
    #[must_use]
    pub fn optimistic(self) -> Self {
        self.strategy(TimeoutStrategy::Optimistic)
    }

    /// Stops waiting for actions at the deadline, whether or not they cooperate.
    #[must_use]
    pub fn pessimistic(self) -> Self {
        self.strategy(TimeoutStrategy::Pessimistic)
    }

    /// Configures a hook invoked when an execution times out.
    ///
    /// The hook runs once per timed-out execution, before the rejection is returned to the
    /// caller, and never for an execution that did not time out. This call replaces any
    /// previous hook.
    #[must_use]
    pub fn on_timeout(mut self, on_timeout: impl Fn(&OnTimeoutArgs) + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(OnTimeout::new(on_timeout));
        self
    }

    /// Configures a hook invoked when an action abandoned by a pessimistic timeout ends.
    ///
    /// The hook runs exactly once per abandoned action, on whatever thread the action ended,
    /// and with no ordering relative to the caller. This call replaces any previous hook.
    #[must_use]
    pub fn on_abandoned(mut self, on_abandoned: impl Fn(&AbandonedOutcome, &OnAbandonedArgs) + Send + Sync + 'static) -> Self {
        self.on_abandoned = Some(OnAbandoned::new(on_abandoned));
        self
    }

    /// Applies a timeout and a strategy loaded from configuration.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    #[must_use]
    pub fn config(self, config: &crate::TimeoutConfig) -> TimeoutBuilder<M, Set> {
        let mut builder = self.strategy(config.strategy);
        builder.timeout = Some(TimeoutSetting::Duration(config.timeout()));
        builder.into_state()
    }

    fn into_state<T>(self) -> TimeoutBuilder<M, T> {
        TimeoutBuilder {
            name: self.name,
            deadlines: self.deadlines,
            spawner: self.spawner,
            timeout: self.timeout,
            strategy: self.strategy,
            on_timeout: self.on_timeout,
            on_timeout_async: self.on_timeout_async,
            on_abandoned: self.on_abandoned,
            telemetry: self.telemetry,
            _state: PhantomData,
        }
    }
}

impl<S> TimeoutBuilder<Cooperative, S> {
    /// Configures an asynchronous hook awaited when an execution times out.
    ///
    /// The hook runs after the synchronous [`on_timeout`][Self::on_timeout] hook and is awaited
    /// to completion before the rejection is returned. This call replaces any previous hook.
    #[must_use]
    pub fn on_timeout_async<F, Fut>(mut self, on_timeout: F) -> Self
    where
        F: Fn(OnTimeoutArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_timeout_async = Some(OnTimeoutAsync::new(move |args| on_timeout(args).boxed()));
        self
    }

    /// Sets the spawner that runs pessimistic actions, replacing the one from
    /// [`PolicyOptions`].
    #[must_use]
    pub fn spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = spawner;
        self
    }
}

impl<M> TimeoutBuilder<M, Set> {
    fn into_shared(self) -> Result<Arc<TimeoutShared>, ValidationError> {
        let timeout = match self.timeout {
            Some(TimeoutSetting::Duration(timeout)) => TimeoutSource::Constant(validate_timeout(timeout)?),
            Some(TimeoutSetting::Seconds(seconds)) => TimeoutSource::Constant(validate_timeout_secs(seconds)?),
            Some(TimeoutSetting::Provider(provider)) => TimeoutSource::Provider(provider),
            // unreachable through the public API, the Set state requires a timeout
            None => TimeoutSource::Constant(TimeoutDuration::Infinite),
        };

        Ok(Arc::new(TimeoutShared {
            name: self.name,
            deadlines: self.deadlines,
            spawner: self.spawner,
            timeout,
            strategy: self.strategy,
            on_timeout: self.on_timeout,
            on_timeout_async: self.on_timeout_async,
            on_abandoned: self.on_abandoned,
            telemetry: self.telemetry,
        }))
    }
}

impl TimeoutBuilder<Blocking, Set> {
    /// Builds the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a constant timeout is not positive.
    pub fn build(self) -> Result<TimeoutPolicy, ValidationError> {
        self.into_shared().map(|shared| TimeoutPolicy { shared })
    }
}

impl TimeoutBuilder<Cooperative, Set> {
    /// Builds the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a constant timeout is not positive.
    pub fn build(self) -> Result<AsyncTimeoutPolicy, ValidationError> {
        self.into_shared().map(|shared| AsyncTimeoutPolicy { shared })
    }
}
