// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cooperative engine: optimistic calls await the action, pessimistic calls race a spawned
//! unit of work against the deadline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread;

use futures::FutureExt;
use futures_util::future::{Either, select};

use super::{
    CallScope, Completion, Resolution, TimeoutShared, abandon_worker, abandoned_settler, check_caller, classify, classify_worker, never_started,
};
use crate::{Cancellation, CancellationToken, Context, TimeoutError, TimeoutStrategy};

pub(crate) async fn run<T, E, F, Fut>(
    shared: &Arc<TimeoutShared>,
    context: &Context,
    caller: &CancellationToken,
    action: F,
) -> Result<T, TimeoutError<E>>
where
    F: FnOnce(Context, CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Cancellation + Send + 'static,
{
    check_caller(caller)?;

    let scope = CallScope::start(shared, context, caller);
    let resolution = match shared.strategy {
        TimeoutStrategy::Optimistic => classify(&scope, action(context.clone(), scope.action_token()).await),
        TimeoutStrategy::Pessimistic => run_pessimistic(shared, &scope, context, action).await,
    };

    finish(shared, &scope, context, resolution).await
}

#[cfg_attr(test, mutants::skip)] // mutations leave the caller waiting forever
async fn run_pessimistic<T, E, F, Fut>(shared: &Arc<TimeoutShared>, scope: &CallScope, context: &Context, action: F) -> Resolution<T, E>
where
    F: FnOnce(Context, CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Cancellation + Send + 'static,
{
    if scope.is_action_cancelled() {
        return never_started(shared, scope, context);
    }

    let completion = Completion::new();
    let worker = Arc::clone(&completion);
    let worker_context = context.clone();
    let token = scope.action_token();

    // The join handle is not needed; the outcome travels through the completion slot.
    drop(shared.spawner.spawn(async move {
        let outcome = AssertUnwindSafe(async move { action(worker_context, token).await })
            .catch_unwind()
            .await;
        worker.complete(outcome);
    }));

    let mut guard = DetachOnDrop {
        shared,
        scope,
        context,
        completion: Some(&*completion),
    };

    let resolution = match select(completion.outcome(), scope.timeout_token().cancelled()).await {
        Either::Left((outcome, _)) => classify_worker(shared, scope, context, outcome),
        Either::Right(((), _)) => abandon_worker(shared, scope, context, &completion),
    };

    guard.completion = None;
    resolution
}

/// Abandons the worker if the caller stops polling before the race is decided, so that its
/// eventual outcome is still reported.
struct DetachOnDrop<'a, T, E>
where
    T: Send + 'static,
    E: Cancellation + Send + 'static,
{
    shared: &'a Arc<TimeoutShared>,
    scope: &'a CallScope,
    context: &'a Context,
    completion: Option<&'a Completion<thread::Result<Result<T, E>>>>,
}

impl<T, E> Drop for DetachOnDrop<'_, T, E>
where
    T: Send + 'static,
    E: Cancellation + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            let (_abandoned, settle) = abandoned_settler(self.shared, self.scope, self.context);
            completion.detach(settle);
        }
    }
}

/// Reports a timeout outside of the raced window: the hooks run to completion before the
/// rejection is returned, and the deadline they report on cannot interrupt them.
async fn finish<T, E>(shared: &TimeoutShared, scope: &CallScope, context: &Context, resolution: Resolution<T, E>) -> Result<T, TimeoutError<E>> {
    match resolution {
        Resolution::Done(result) => result,
        Resolution::TimedOut { cause, abandoned } => {
            let args = shared.report_timeout(scope, context, cause, abandoned);
            if let Some(on_timeout_async) = &shared.on_timeout_async {
                on_timeout_async.call(args.clone()).await;
            }

            Err(shared.reject(args))
        }
    }
}
