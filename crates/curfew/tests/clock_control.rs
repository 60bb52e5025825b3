// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deterministic timeout scenarios driven by `tick::ClockControl`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use curfew::{AsyncTimeoutPolicy, CancellationSource, Cancelled, Context, Deadlines, PolicyOptions, TimeoutDuration, TimeoutPolicy};
use tick::ClockControl;

#[test]
fn auto_advancing_clock_fires_at_configured_timeout() {
    let deadlines = Deadlines::new(ClockControl::new().auto_advance_timers(true).to_clock());
    let start = deadlines.now();
    let policy = TimeoutPolicy::builder("controlled", &PolicyOptions::new().deadlines(deadlines.clone()))
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let sleeper = deadlines.clone();
    let result = policy.execute(move |_, token| sleeper.sleep(Duration::from_secs(1), &token));

    assert!(result.unwrap_err().is_rejected());
    assert_eq!(deadlines.now() - start, Duration::from_millis(200));
}

#[test]
fn work_shorter_than_timeout_completes() {
    let control = ClockControl::new();
    let policy = TimeoutPolicy::builder("controlled", &PolicyOptions::new().deadlines(control.to_clock()))
        .timeout(Duration::from_millis(200))
        .on_timeout(|_| panic!("no timeout expected"))
        .build()
        .unwrap();

    let result = policy.execute(move |_, token| {
        control.advance(Duration::from_millis(199));
        token.check()?;
        Ok::<_, Cancelled>("Good")
    });

    assert_eq!(result.unwrap(), "Good");
}

#[test]
fn work_reaching_timeout_is_rejected() {
    let control = ClockControl::new();
    let policy = TimeoutPolicy::builder("controlled", &PolicyOptions::new().deadlines(control.to_clock()))
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let result = policy.execute(move |_, token| {
        control.advance(Duration::from_millis(200));
        token.check()
    });

    assert!(result.unwrap_err().is_rejected());
}

#[test]
fn provider_resolves_per_execution() {
    let control = ClockControl::new();
    let resolved = Arc::new(AtomicUsize::new(0));
    let resolved_clone = Arc::clone(&resolved);
    let policy = TimeoutPolicy::builder("controlled", &PolicyOptions::new().deadlines(control.to_clock()))
        .timeout_provider(move |context| {
            resolved_clone.fetch_add(1, Ordering::SeqCst);
            match context.operation_key() {
                Some("slow") => TimeoutDuration::from_secs(10),
                _ => TimeoutDuration::from_millis(10),
            }
        })
        .build()
        .unwrap();

    for (key, rejected) in [("slow", false), ("fast", true)] {
        let control = control.clone();
        let result = policy.execute_with(&Context::with_operation_key(key), &CancellationSource::new().token(), move |_, token| {
            control.advance(Duration::from_secs(1));
            token.check()
        });

        assert_eq!(result.is_err_and(|error| error.is_rejected()), rejected, "operation {key}");
    }

    assert_eq!(resolved.load(Ordering::SeqCst), 2);
}

#[test]
fn async_optimistic_timeout_with_manual_advance() {
    let control = ClockControl::new();
    let deadlines = Deadlines::new(control.to_clock());
    let policy = AsyncTimeoutPolicy::builder("controlled", &PolicyOptions::new().deadlines(deadlines.clone()))
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let execution = policy.execute(move |_, token| async move {
        let sleep = deadlines.sleep_async(Duration::from_secs(1), &token);
        control.advance(Duration::from_millis(50));
        sleep.await
    });

    let result = futures::executor::block_on(execution);
    assert!(result.unwrap_err().is_rejected());
}

#[test]
fn async_pessimistic_timeout_with_manual_advance() {
    let control = ClockControl::new();
    let policy = AsyncTimeoutPolicy::builder("controlled", &PolicyOptions::new().deadlines(control.to_clock()))
        .timeout(Duration::from_millis(50))
        .pessimistic()
        .build()
        .unwrap();

    let execution = policy.execute(move |_, _| async move {
        control.advance(Duration::from_millis(50));
        futures::future::pending::<Result<(), Cancelled>>().await
    });

    let result = futures::executor::block_on(execution);
    assert!(result.unwrap_err().is_rejected());
}
