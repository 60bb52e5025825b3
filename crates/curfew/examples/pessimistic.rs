// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pessimistic timeout example.
//!
//! The action ignores its cancellation token and blocks well past the deadline. The caller
//! gets control back at the deadline, and the outcome of the abandoned action is reported
//! once it finally ends.

use std::thread;
use std::time::Duration;

use anyhow::Context as _;
use curfew::{AbandonedOutcome, PolicyOptions, TimeoutPolicy};

const TIMEOUT_DURATION: Duration = Duration::from_millis(100);
const PROCESSING_DELAY: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    // Create common options, with structured logs of timeout events
    let options = PolicyOptions::new().name("reports").enable_logs();

    let policy = TimeoutPolicy::builder("render_report", &options)
        // Required: specify the timeout duration
        .timeout(TIMEOUT_DURATION)
        .pessimistic()
        .on_timeout(|args| println!("gave up after {}", args.timeout()))
        .on_abandoned(|outcome, _args| match outcome {
            AbandonedOutcome::Failed(_) => println!("abandoned render failed: {:?}", outcome.downcast_error::<std::io::Error>()),
            _ => println!("abandoned render ended: {}", outcome.as_str()),
        })
        .build()
        .context("invalid timeout configuration")?;

    let mut abandoned = 0;
    for i in 0..3 {
        let error = policy
            .execute(move |_context, _token| {
                // Simulate blocking work that never checks its token
                thread::sleep(PROCESSING_DELAY);
                if i % 2 == 0 {
                    Ok(())
                } else {
                    Err(std::io::Error::other("printer jammed"))
                }
            })
            .unwrap_err();

        println!("{i} attempt, error: {error}");
        if error.is_rejected() {
            abandoned += 1;
        }
    }

    // Give the abandoned renders time to end so their outcomes are reported
    thread::sleep(PROCESSING_DELAY * 2);
    println!("{abandoned} renders were abandoned");

    Ok(())
}
