// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Blocking engine: optimistic calls run inline, pessimistic calls run on a worker thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::{CallScope, Completion, Resolution, TimeoutShared, abandon_worker, check_caller, classify, classify_worker, never_started};
use crate::spawn::spawn_worker;
use crate::{Cancellation, CancellationToken, Context, TimeoutError, TimeoutStrategy};

pub(crate) fn run<T, E, F>(shared: &Arc<TimeoutShared>, context: &Context, caller: &CancellationToken, action: F) -> Result<T, TimeoutError<E>>
where
    F: FnOnce(&Context, CancellationToken) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Cancellation + Send + 'static,
{
    check_caller(caller)?;

    let scope = CallScope::start(shared, context, caller);
    let resolution = match shared.strategy {
        TimeoutStrategy::Optimistic => classify(&scope, action(context, scope.action_token())),
        TimeoutStrategy::Pessimistic => run_pessimistic(shared, &scope, context, action),
    };

    finish(shared, &scope, context, resolution)
}

#[cfg_attr(test, mutants::skip)] // mutations leave the caller waiting forever
fn run_pessimistic<T, E, F>(shared: &Arc<TimeoutShared>, scope: &CallScope, context: &Context, action: F) -> Resolution<T, E>
where
    F: FnOnce(&Context, CancellationToken) -> Result<T, E> + Send + 'static,
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

    spawn_worker(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(&worker_context, token)));
        worker.complete(outcome);
    });

    match completion.wait(&scope.timeout_token()) {
        Some(outcome) => classify_worker(shared, scope, context, outcome),
        None => abandon_worker(shared, scope, context, &completion),
    }
}

fn finish<T, E>(shared: &TimeoutShared, scope: &CallScope, context: &Context, resolution: Resolution<T, E>) -> Result<T, TimeoutError<E>> {
    match resolution {
        Resolution::Done(result) => result,
        Resolution::TimedOut { cause, abandoned } => {
            let args = shared.report_timeout(scope, context, cause, abandoned);
            Err(shared.reject(args))
        }
    }
}
