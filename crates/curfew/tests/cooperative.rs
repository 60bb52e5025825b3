// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for asynchronous timeout policies using only public API.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use curfew::{
    AbandonedAction, AbandonedOutcome, AsyncTimeoutPolicy, CancellationSource, CancellationToken, Cancelled, Context, Deadlines, PolicyOptions,
    TimeoutDuration, TimeoutError, TimeoutStrategy,
};
use futures::FutureExt;
use futures::channel::oneshot;

/// Sleeps without observing any token. Runs outside of Tokio, as pessimistic work does.
async fn uncooperative_sleep(duration: Duration) {
    let _ = Deadlines::system().sleep_async(duration, &CancellationToken::none()).await;
}

fn policy(timeout: Duration, strategy: TimeoutStrategy) -> AsyncTimeoutPolicy {
    AsyncTimeoutPolicy::builder("test_timeout", &PolicyOptions::new())
        .timeout(timeout)
        .strategy(strategy)
        .build()
        .unwrap()
}

#[tokio::test]
async fn pessimistic_returns_at_deadline() {
    let policy = policy(Duration::from_millis(50), TimeoutStrategy::Pessimistic);
    let started = Instant::now();

    let result = policy
        .execute(|_, _| async {
            uncooperative_sleep(Duration::from_millis(3000)).await;
            Ok::<_, Cancelled>("Late")
        })
        .await;

    assert!(result.unwrap_err().is_rejected());
    assert!(started.elapsed() < Duration::from_millis(2000));
}

#[tokio::test]
async fn pessimistic_returns_value_within_timeout() {
    let policy = policy(Duration::from_millis(1000), TimeoutStrategy::Pessimistic);

    let result = policy
        .execute(|_, _| async {
            uncooperative_sleep(Duration::from_millis(500)).await;
            Ok::<_, Cancelled>("Good")
        })
        .await;

    assert_eq!(result.unwrap(), "Good");
}

#[tokio::test]
async fn optimistic_rejects_cooperative_action() {
    let deadlines = Deadlines::system();
    let policy = AsyncTimeoutPolicy::builder("test_timeout", &PolicyOptions::new().deadlines(deadlines.clone()))
        .timeout(Duration::from_millis(30))
        .build()
        .unwrap();

    let result = policy
        .execute(move |_, token| async move { deadlines.sleep_async(Duration::from_secs(5), &token).await })
        .await;

    let error = result.unwrap_err();
    assert!(error.is_rejected());
    assert_eq!(error.rejected().unwrap().strategy(), TimeoutStrategy::Optimistic);
}

#[tokio::test]
async fn optimistic_waits_for_uncooperative_action() {
    let policy = policy(Duration::from_millis(30), TimeoutStrategy::Optimistic);

    let result = policy
        .execute(|_, token| async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            assert!(token.is_cancelled());
            Ok::<_, Cancelled>("finished")
        })
        .await;

    assert_eq!(result.unwrap(), "finished");
}

#[tokio::test]
async fn pre_cancelled_caller_never_runs_action() {
    for strategy in [TimeoutStrategy::Optimistic, TimeoutStrategy::Pessimistic] {
        let caller = CancellationSource::new();
        caller.cancel();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let result = policy(Duration::from_secs(1), strategy)
            .execute_with(&Context::new(), &caller.token(), move |_, _| async move {
                ran_clone.store(true, Ordering::SeqCst);
                Ok::<_, Cancelled>(())
            })
            .await;

        assert!(matches!(result, Err(TimeoutError::Cancelled(_))));
        assert!(!ran.load(Ordering::SeqCst));
    }
}

#[tokio::test]
async fn hooks_receive_timeout_and_context() {
    let context = Context::with_operation_key("render_page");
    let sync_expected = context.clone();
    let async_expected = context.clone();
    let calls = Arc::new(AtomicUsize::new(0));
    let sync_calls = Arc::clone(&calls);
    let async_calls = Arc::clone(&calls);

    let policy = AsyncTimeoutPolicy::builder("test_timeout", &PolicyOptions::new())
        .timeout(Duration::from_millis(40))
        .pessimistic()
        .on_timeout(move |args| {
            assert_eq!(args.timeout(), TimeoutDuration::from_millis(40));
            assert!(args.context().ptr_eq(&sync_expected));
            sync_calls.fetch_add(1, Ordering::SeqCst);
        })
        .on_timeout_async(move |args| {
            let async_expected = async_expected.clone();
            let async_calls = Arc::clone(&async_calls);
            async move {
                assert!(args.context().ptr_eq(&async_expected));
                assert!(args.abandoned().is_some());
                tokio::task::yield_now().await;
                async_calls.fetch_add(10, Ordering::SeqCst);
            }
        })
        .build()
        .unwrap();

    let timed_out = policy
        .execute_with(&context, &CancellationSource::new().token(), |_, _| async {
            uncooperative_sleep(Duration::from_millis(500)).await;
            Ok::<_, Cancelled>(())
        })
        .await;
    assert!(timed_out.unwrap_err().is_rejected());
    assert_eq!(calls.load(Ordering::SeqCst), 11);

    let succeeded = policy
        .execute_with(&context, &CancellationSource::new().token(), |_, _| async { Ok::<_, Cancelled>(()) })
        .await;
    assert!(succeeded.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 11);
}

#[tokio::test]
async fn abandoned_failure_is_observed() {
    let (release, blocked) = oneshot::channel::<()>();
    let handle = Arc::new(Mutex::new(None::<AbandonedAction>));
    let handle_clone = Arc::clone(&handle);

    let policy = AsyncTimeoutPolicy::builder("test_timeout", &PolicyOptions::new())
        .timeout(Duration::from_millis(20))
        .pessimistic()
        .on_timeout(move |args| *handle_clone.lock().unwrap() = args.abandoned().cloned())
        .build()
        .unwrap();

    let result = policy
        .execute(|_, _| async move {
            blocked.await.ok();
            Err::<(), _>(std::io::Error::other("connection reset"))
        })
        .await;
    assert!(result.unwrap_err().is_rejected());

    release.send(()).unwrap();
    let handle = handle.lock().unwrap().take().unwrap();
    handle.settled().await;

    let outcome = handle.take_outcome().unwrap();
    assert!(outcome.is_faulted());
    assert_eq!(
        outcome.downcast_error::<std::io::Error>().map(ToString::to_string).as_deref(),
        Some("connection reset")
    );
}

#[tokio::test]
async fn abandoned_cooperative_action_reports_cancellation() {
    let handle = Arc::new(Mutex::new(None::<AbandonedAction>));
    let handle_clone = Arc::clone(&handle);
    let deadlines = Deadlines::system();

    let policy = AsyncTimeoutPolicy::builder("test_timeout", &PolicyOptions::new().deadlines(deadlines.clone()))
        .timeout(Duration::from_millis(20))
        .pessimistic()
        .on_timeout(move |args| *handle_clone.lock().unwrap() = args.abandoned().cloned())
        .build()
        .unwrap();

    let result = policy
        .execute(move |_, token| async move { deadlines.sleep_async(Duration::from_secs(5), &token).await })
        .await;
    assert!(result.unwrap_err().is_rejected());

    let handle = handle.lock().unwrap().take().unwrap();
    handle.settled().await;

    assert!(matches!(handle.take_outcome(), Some(AbandonedOutcome::Cancelled(_))));
}

#[tokio::test]
async fn panic_payload_reaches_caller() {
    async fn explode() -> Result<(), Cancelled> {
        std::panic::panic_any(17_u32)
    }

    let policy = policy(Duration::from_secs(5), TimeoutStrategy::Pessimistic);

    let caught = std::panic::AssertUnwindSafe(policy.execute(|_, _| explode()))
        .catch_unwind()
        .await
        .unwrap_err();

    assert_eq!(caught.downcast_ref::<u32>(), Some(&17));
}

#[tokio::test]
async fn caller_cancellation_during_action_is_not_rejection() {
    let caller = Arc::new(CancellationSource::new());
    let caller_clone = Arc::clone(&caller);
    let policy = AsyncTimeoutPolicy::builder("test_timeout", &PolicyOptions::new())
        .timeout(Duration::from_secs(5))
        .on_timeout(|_| panic!("no timeout expected"))
        .build()
        .unwrap();

    let result = policy
        .execute_with(&Context::new(), &caller.token(), move |_, token| async move {
            caller_clone.cancel();
            token.cancelled().await;
            token.check()
        })
        .await;

    let error = result.unwrap_err();
    assert!(error.is_cancelled());
    assert!(!error.is_rejected());
    assert!(matches!(error, TimeoutError::Action(_)));
}

#[tokio::test]
async fn pessimistic_caller_cancellation_waits_for_uncooperative_worker() {
    let caller = CancellationSource::new();
    let caller_token = caller.token();
    let (started_tx, started_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let policy = AsyncTimeoutPolicy::builder("test_timeout", &PolicyOptions::new())
        .timeout(Duration::from_secs(5))
        .pessimistic()
        .on_timeout(|_| panic!("no timeout expected"))
        .on_abandoned(|_, _| panic!("nothing is abandoned"))
        .build()
        .unwrap();

    let canceller = std::thread::spawn(move || {
        started_rx.recv().unwrap();
        caller.cancel();
        release_tx.send(()).unwrap();
    });

    let result = policy
        .execute_with(&Context::new(), &caller_token, move |_, token| async move {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            assert!(token.is_cancelled());
            Ok::<_, Cancelled>("ignored the caller")
        })
        .await;

    canceller.join().unwrap();
    assert_eq!(result.unwrap(), "ignored the caller");
}

#[tokio::test]
async fn nested_policies_compose() {
    let deadlines = Deadlines::system();
    let outer = policy(Duration::from_millis(40), TimeoutStrategy::Optimistic);
    let inner = policy(Duration::from_secs(10), TimeoutStrategy::Optimistic);

    let result = outer
        .execute(move |context, token| async move {
            inner
                .execute_with(&context, &token, move |_, token| async move {
                    deadlines.sleep_async(Duration::from_secs(5), &token).await
                })
                .await
        })
        .await;

    assert!(result.unwrap_err().is_rejected());
}

#[tokio::test]
async fn pessimistic_isolates_blocking_future() {
    let policy = policy(Duration::from_millis(20), TimeoutStrategy::Pessimistic);

    let result = policy
        .execute(|_, _| async {
            std::thread::sleep(Duration::from_millis(200));
            Ok::<_, Cancelled>(())
        })
        .await;

    assert!(result.unwrap_err().is_rejected());
}
