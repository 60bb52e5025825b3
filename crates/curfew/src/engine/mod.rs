// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Race, abandon and classification logic shared by the blocking and cooperative engines.
//!
//! The two engines differ only in how they wait for a pessimistic worker: the blocking engine
//! parks the calling thread on the [`Completion`] slot, the cooperative engine awaits it.

pub(crate) mod blocking;
mod completion;
pub(crate) mod cooperative;

use std::borrow::Cow;
use std::sync::Arc;
use std::thread;

pub(crate) use completion::Completion;

use crate::policy::{OnAbandoned, OnAbandonedArgs, OnTimeout, OnTimeoutArgs, OnTimeoutAsync, TimeoutProvider};
use crate::utils::TelemetryHelper;
use crate::{
    AbandonedAction, AbandonedOutcome, Cancellation, CancellationSource, CancellationToken, Cancelled, Context, Deadlines, Spawner,
    TimeoutDuration, TimeoutError, TimeoutRejected, TimeoutStrategy, telemetry,
};

/// Where a policy takes the timeout of each execution from.
#[derive(Debug, Clone)]
pub(crate) enum TimeoutSource {
    Constant(TimeoutDuration),
    Provider(TimeoutProvider),
}

impl TimeoutSource {
    pub(crate) fn resolve(&self, context: &Context) -> TimeoutDuration {
        match self {
            Self::Constant(timeout) => *timeout,
            Self::Provider(provider) => provider.call(context),
        }
    }
}

/// Immutable configuration shared by every clone of a policy.
#[derive(Debug)]
pub(crate) struct TimeoutShared {
    pub(crate) name: Cow<'static, str>,
    pub(crate) deadlines: Deadlines,
    pub(crate) spawner: Spawner,
    pub(crate) timeout: TimeoutSource,
    pub(crate) strategy: TimeoutStrategy,
    pub(crate) on_timeout: Option<OnTimeout>,
    pub(crate) on_timeout_async: Option<OnTimeoutAsync>,
    pub(crate) on_abandoned: Option<OnAbandoned>,
    pub(crate) telemetry: TelemetryHelper,
}

impl TimeoutShared {
    /// Reports a timeout and runs the synchronous hook, returning the hook's arguments.
    fn report_timeout(&self, scope: &CallScope, context: &Context, cause: Cancelled, abandoned: Option<AbandonedAction>) -> OnTimeoutArgs {
        telemetry::report_timeout(&self.telemetry, context, scope.timeout, self.strategy);

        let args = OnTimeoutArgs {
            context: context.clone(),
            timeout: scope.timeout,
            strategy: self.strategy,
            abandoned,
            cause,
        };

        if let Some(on_timeout) = &self.on_timeout {
            on_timeout.call(&args);
        }

        args
    }

    fn reject<E>(&self, args: OnTimeoutArgs) -> TimeoutError<E> {
        TimeoutError::Rejected(TimeoutRejected::new(args.timeout, self.strategy, args.cause))
    }

    /// Delivers the terminal outcome of an abandoned action exactly once.
    ///
    /// The hook and telemetry run before the handle settles, so a caller that waited for the
    /// handle observes their effects.
    fn settle_abandoned(&self, abandoned: &AbandonedAction, context: &Context, timeout: TimeoutDuration, outcome: AbandonedOutcome) {
        telemetry::report_abandoned(&self.telemetry, context, timeout, self.strategy, &outcome);

        if let Some(on_abandoned) = &self.on_abandoned {
            on_abandoned.call(
                &outcome,
                &OnAbandonedArgs {
                    context: context.clone(),
                    timeout,
                },
            );
        }

        abandoned.settle(outcome);
    }
}

/// Cancellation state of a single execution.
///
/// The timeout source fires only when the deadline passes; the combined source fires when
/// either the deadline passes or the caller cancels. Dropping the scope disarms the deadline
/// and removes the combined source's registration from the caller's token.
#[derive(Debug)]
pub(crate) struct CallScope {
    timeout: TimeoutDuration,
    timeout_source: CancellationSource,
    combined: CancellationSource,
}

impl CallScope {
    /// Resolves the timeout for this execution and arms its deadline.
    pub(crate) fn start(shared: &TimeoutShared, context: &Context, caller: &CancellationToken) -> Self {
        let timeout = shared.timeout.resolve(context);
        let timeout_source = CancellationSource::new();
        let combined = CancellationSource::linked(&[caller, &timeout_source.token()]);

        if let Some(after) = timeout.as_duration() {
            shared.deadlines.cancel_after(&timeout_source, after);
        }

        Self {
            timeout,
            timeout_source,
            combined,
        }
    }

    /// The token handed to the action.
    pub(crate) fn action_token(&self) -> CancellationToken {
        self.combined.token()
    }

    /// The token that fires only when the deadline passes.
    pub(crate) fn timeout_token(&self) -> CancellationToken {
        self.timeout_source.token()
    }

    /// Returns `true` once the deadline has passed.
    pub(crate) fn timed_out(&self) -> bool {
        self.timeout_source.is_cancelled()
    }

    /// Returns `true` if the action would start with an already cancelled token.
    pub(crate) fn is_action_cancelled(&self) -> bool {
        self.combined.is_cancelled()
    }

    /// The cancellation observed on the deadline itself.
    pub(crate) fn timeout_cause(&self) -> Cancelled {
        Cancelled::new(&self.timeout_token())
    }
}

/// Outcome of a single execution before timeouts are reported.
pub(crate) enum Resolution<T, E> {
    Done(Result<T, TimeoutError<E>>),
    TimedOut { cause: Cancelled, abandoned: Option<AbandonedAction> },
}

/// Fails fast when the caller has already given up.
pub(crate) fn check_caller<E>(caller: &CancellationToken) -> Result<(), TimeoutError<E>> {
    caller.check().map_err(TimeoutError::Cancelled)
}

/// Classifies what the action returned.
///
/// A cancellation error is a timeout only if the deadline actually fired. The token inside the
/// error is not consulted, as the action may have combined tokens further.
pub(crate) fn classify<T, E: Cancellation>(scope: &CallScope, result: Result<T, E>) -> Resolution<T, E> {
    match result {
        Ok(value) => Resolution::Done(Ok(value)),
        Err(error) => {
            if scope.timed_out()
                && let Some(cancelled) = error.as_cancelled()
            {
                return Resolution::TimedOut {
                    cause: cancelled.clone(),
                    abandoned: None,
                };
            }

            Resolution::Done(Err(TimeoutError::Action(error)))
        }
    }
}

/// Classifies what a finished pessimistic worker reported, resuming its panic on the caller.
///
/// A worker that stopped on the deadline's cancellation before it could be abandoned still
/// hands the hook an abandoned handle, one that is already settled as cancelled.
pub(crate) fn classify_worker<T, E: Cancellation>(
    shared: &TimeoutShared,
    scope: &CallScope,
    context: &Context,
    outcome: thread::Result<Result<T, E>>,
) -> Resolution<T, E> {
    let resolution = match outcome {
        Ok(result) => classify(scope, result),
        Err(payload) => std::panic::resume_unwind(payload),
    };

    match resolution {
        Resolution::TimedOut { cause, abandoned: None } => settled_timeout(shared, scope, context, cause),
        resolution => resolution,
    }
}

/// Switches a pessimistic worker to abandoned once the deadline has won the race.
///
/// Returns the worker's outcome instead if it finished before the switch.
pub(crate) fn abandon_worker<T, E>(
    shared: &Arc<TimeoutShared>,
    scope: &CallScope,
    context: &Context,
    completion: &Completion<thread::Result<Result<T, E>>>,
) -> Resolution<T, E>
where
    T: Send + 'static,
    E: Cancellation + Send + 'static,
{
    let (abandoned, settle) = abandoned_settler(shared, scope, context);

    match completion.abandon(settle) {
        Ok(()) => Resolution::TimedOut {
            cause: scope.timeout_cause(),
            abandoned: Some(abandoned),
        },
        Err(outcome) => classify_worker(shared, scope, context, outcome),
    }
}

/// Creates an abandoned handle along with the callback that settles it from a worker outcome.
pub(crate) fn abandoned_settler<T, E>(
    shared: &Arc<TimeoutShared>,
    scope: &CallScope,
    context: &Context,
) -> (AbandonedAction, impl FnOnce(thread::Result<Result<T, E>>) + Send + use<T, E>)
where
    T: Send + 'static,
    E: Cancellation + Send + 'static,
{
    let abandoned = AbandonedAction::new();
    let settle = {
        let shared = Arc::clone(shared);
        let abandoned = abandoned.clone();
        let context = context.clone();
        let timeout = scope.timeout;
        move |outcome: thread::Result<Result<T, E>>| {
            shared.settle_abandoned(&abandoned, &context, timeout, AbandonedOutcome::from_result(outcome));
        }
    };

    (abandoned, settle)
}

/// Resolves a pessimistic call whose action token was cancelled before the worker started.
///
/// The worker is never started. A fired deadline still hands the hook an abandoned handle, one
/// that is already settled as cancelled.
pub(crate) fn never_started<T, E>(shared: &TimeoutShared, scope: &CallScope, context: &Context) -> Resolution<T, E> {
    if scope.timed_out() {
        return settled_timeout(shared, scope, context, scope.timeout_cause());
    }

    Resolution::Done(Err(TimeoutError::Cancelled(Cancelled::new(&scope.action_token()))))
}

fn settled_timeout<T, E>(shared: &TimeoutShared, scope: &CallScope, context: &Context, cause: Cancelled) -> Resolution<T, E> {
    let abandoned = AbandonedAction::new();
    shared.settle_abandoned(&abandoned, context, scope.timeout, AbandonedOutcome::Cancelled(cause.clone()));

    Resolution::TimedOut {
        cause,
        abandoned: Some(abandoned),
    }
}
