// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(
    not(all(feature = "tokio", feature = "serde")),
    expect(
        rustdoc::broken_intra_doc_links,
        reason = "feature-gated items are linked from the crate documentation"
    )
)]

//! Timeout enforcement for blocking and asynchronous operations.
//!
//! A timeout policy bounds how long a caller waits for an action. Every execution receives a
//! [`CancellationToken`] that is cancelled once the deadline passes, or once the caller's own
//! token is cancelled, whichever happens first. Exactly one outcome is observed per execution:
//! the action's result, a [`TimeoutRejected`] when the deadline won, or a [`Cancelled`] error
//! when the caller had already given up.
//!
//! # Strategies
//!
//! - [`TimeoutStrategy::Optimistic`] trusts the action to observe its token. The action runs on
//!   the caller's thread (or inside the caller's future), and no background work is ever left
//!   behind. An action that ignores its token is not interrupted.
//! - [`TimeoutStrategy::Pessimistic`] stops waiting at the deadline whether or not the action
//!   cooperates. The action runs as a separate unit of work that is abandoned, not stopped,
//!   when the deadline passes. Its eventual outcome is delivered to the [`AbandonedAction`]
//!   handed to the on-timeout hook.
//!
//! # Quick Start
//!
//! ```rust
//! # use std::time::Duration;
//! use curfew::{Cancelled, Deadlines, PolicyOptions, TimeoutPolicy};
//!
//! let deadlines = Deadlines::system();
//! let options = PolicyOptions::new().deadlines(deadlines.clone()).name("inventory");
//!
//! let policy = TimeoutPolicy::builder("load_stock", &options)
//!     .timeout(Duration::from_millis(20))
//!     .on_timeout(|args| println!("gave up after {}", args.timeout()))
//!     .build()?;
//!
//! // Cooperative action: sleeps until its token is cancelled.
//! let result = policy.execute(move |_context, token| deadlines.sleep(Duration::from_secs(10), &token));
//! assert!(result.unwrap_err().is_rejected());
//!
//! let result = policy.execute(|_context, _token| Ok::<_, Cancelled>(42));
//! assert_eq!(result.unwrap(), 42);
//! # Ok::<(), curfew::ValidationError>(())
//! ```
//!
//! # Core Types
//!
//! - [`TimeoutPolicy`] and [`AsyncTimeoutPolicy`]: enforce timeouts on blocking and
//!   asynchronous actions, configured through [`TimeoutBuilder`].
//! - [`CancellationSource`] and [`CancellationToken`]: cooperative cancellation.
//! - [`Deadlines`]: arms deadlines on a [`tick::Clock`]. Tests substitute a clock created from
//!   `tick::ClockControl` to make timeouts deterministic.
//! - [`Spawner`]: the [`anyspawn`] spawner that runs asynchronous pessimistic actions.
//! - [`Context`]: per-execution context passed to actions, providers and hooks.
//! - [`TimeoutError`]: the failure side of an execution.
//!
//! # Nesting
//!
//! [`TimeoutError`] implements [`Cancellation`], so an outer policy recognises the
//! cancellation of an inner one. Pass the token an action receives on to inner executions to
//! let an outer deadline cancel them.
//!
//! ## Features
//!
//! - `tokio`: Enables [`Spawner::new_tokio`] for scheduling asynchronous pessimistic actions.
//! - `serde`: Enables [`TimeoutConfig`] for loading timeout settings from configuration.
//! - `metrics`: Reports timeout events through OpenTelemetry metrics.
//! - `logs`: Reports timeout events as structured `tracing` events.

mod abandoned;
mod cancel;
#[cfg(feature = "serde")]
mod config;
mod context;
mod deadline;
mod duration;
mod engine;
mod error;
#[cfg(any(feature = "metrics", test))]
mod metrics;
mod options;
mod policy;
mod shared;
mod spawn;
mod strategy;
mod telemetry;
mod utils;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;

pub use abandoned::{AbandonedAction, AbandonedOutcome};
pub use anyspawn::Spawner;
pub use cancel::{CancellationSource, CancellationToken, Registration, WaitForCancellation};
#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub use config::TimeoutConfig;
pub use context::Context;
pub use deadline::{Deadlines, Sleep};
pub use duration::{TimeoutDuration, validate_timeout, validate_timeout_secs};
pub use error::{Cancellation, Cancelled, TimeoutError, TimeoutRejected, ValidationError};
pub use options::PolicyOptions;
pub use policy::{AsyncTimeoutPolicy, OnAbandonedArgs, OnTimeoutArgs, TimeoutBuilder, TimeoutPolicy};
pub use shared::{Blocking, Cooperative, NotSet, Set};
pub use strategy::TimeoutStrategy;
