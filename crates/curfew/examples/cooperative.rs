// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Asynchronous timeout example.
//!
//! An optimistic policy wraps a cooperative action that observes its token, and a pessimistic
//! policy scheduled on Tokio wraps an action that does not. Deadlines run on a clock driven by
//! the Tokio runtime.

use std::time::Duration;

use anyhow::anyhow;
use curfew::{AsyncTimeoutPolicy, Cancelled, Deadlines, PolicyOptions, Spawner};
use tick::Clock;

const TIMEOUT_DURATION: Duration = Duration::from_millis(100);
const PROCESSING_DELAY: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let deadlines = Deadlines::new(Clock::new_tokio());
    let options = PolicyOptions::new().deadlines(deadlines.clone()).spawner(Spawner::new_tokio());

    let optimistic = AsyncTimeoutPolicy::builder("fetch_cooperative", &options)
        .timeout(TIMEOUT_DURATION)
        .build()?;

    let error = optimistic
        .execute(move |_context, token| async move {
            // Stops as soon as the deadline cancels the token
            deadlines.sleep_async(PROCESSING_DELAY, &token).await
        })
        .await
        .unwrap_err();
    println!("optimistic: {error}");

    let pessimistic = AsyncTimeoutPolicy::builder("fetch_stubborn", &options)
        .timeout(TIMEOUT_DURATION)
        .pessimistic()
        .on_timeout_async(|args| async move {
            // Report the abandoned fetch in the background, without delaying the caller
            if let Some(abandoned) = args.abandoned().cloned() {
                tokio::spawn(async move {
                    abandoned.settled().await;
                    println!("abandoned fetch ended: {:?}", abandoned.take_outcome().map(|outcome| outcome.as_str()));
                });
            }
        })
        .build()?;

    let error = pessimistic
        .execute(|_context, _token| async {
            // Ignores the token entirely
            tokio::time::sleep(PROCESSING_DELAY).await;
            Ok::<_, Cancelled>("payload")
        })
        .await
        .unwrap_err();
    println!("pessimistic: {error}");

    // Let the abandoned fetch end before the runtime shuts down
    tokio::time::sleep(PROCESSING_DELAY).await;

    if error.is_rejected() { Ok(()) } else { Err(anyhow!("expected a timeout")) }
}
