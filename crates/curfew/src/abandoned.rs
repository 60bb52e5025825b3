// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::{Cancellation, CancellationSource, Cancelled, WaitForCancellation};

/// How an abandoned action eventually ended.
#[derive(Debug)]
#[non_exhaustive]
pub enum AbandonedOutcome {
    /// The action returned a value, which was dropped.
    Completed,

    /// The action stopped with a cancellation error.
    Cancelled(Cancelled),

    /// The action returned an error.
    ///
    /// The payload is the action's own error value; recover it with
    /// [`downcast_error`][Self::downcast_error].
    Failed(Box<dyn Any + Send>),

    /// The action panicked. The payload is the original panic payload.
    Panicked(Box<dyn Any + Send>),
}

impl AbandonedOutcome {
    pub(crate) fn from_result<T, E>(result: thread::Result<Result<T, E>>) -> Self
    where
        E: Cancellation + Send + 'static,
    {
        match result {
            Ok(Ok(_)) => Self::Completed,
            Ok(Err(error)) => match error.as_cancelled() {
                Some(cancelled) => Self::Cancelled(cancelled.clone()),
                None => Self::Failed(Box::new(error)),
            },
            Err(payload) => Self::Panicked(payload),
        }
    }

    /// Returns `true` if the action failed or panicked.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Panicked(_))
    }

    /// Returns the action's error if it failed with an error of type `E`.
    #[must_use]
    pub fn downcast_error<E: 'static>(&self) -> Option<&E> {
        match self {
            Self::Failed(error) => error.downcast_ref(),
            _ => None,
        }
    }

    /// Returns the panic message if the action panicked with a string payload.
    #[must_use]
    pub fn panic_message(&self) -> Option<&str> {
        let Self::Panicked(payload) = self else {
            return None;
        };

        payload
            .downcast_ref::<&'static str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
    }

    /// Returns a stable `snake_case` name used in telemetry.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled(_) => "cancelled",
            Self::Failed(_) => "failed",
            Self::Panicked(_) => "panicked",
        }
    }
}

/// Handle to an action that a pessimistic timeout stopped waiting for.
///
/// The action keeps running after the caller has received the rejection. Once it ends, its
/// [`AbandonedOutcome`] is delivered here exactly once, so failures of abandoned work are never
/// lost. The handle is passed to the on-timeout hook; clones share the same outcome.
///
/// # Examples
///
/// ```rust
/// # use std::time::Duration;
/// use std::sync::{Arc, Mutex};
///
/// use curfew::{AbandonedAction, PolicyOptions, TimeoutPolicy};
///
/// let abandoned: Arc<Mutex<Option<AbandonedAction>>> = Arc::default();
/// let captured = Arc::clone(&abandoned);
///
/// let policy = TimeoutPolicy::builder("slow_io", &PolicyOptions::new())
///     .timeout(Duration::from_millis(10))
///     .pessimistic()
///     .on_timeout(move |args| *captured.lock().unwrap() = args.abandoned().cloned())
///     .build()?;
///
/// let result = policy.execute(|_, _| {
///     std::thread::sleep(Duration::from_millis(100));
///     Err::<(), _>(std::io::Error::other("late failure"))
/// });
/// assert!(result.unwrap_err().is_rejected());
///
/// let abandoned = abandoned.lock().unwrap().take().unwrap();
/// assert!(abandoned.wait_settled(Duration::from_secs(10)));
/// assert!(abandoned.take_outcome().unwrap().is_faulted());
/// # Ok::<(), curfew::ValidationError>(())
/// ```
#[derive(Clone)]
pub struct AbandonedAction {
    inner: Arc<Inner>,
}

struct Inner {
    settlement: Mutex<Settlement>,
    changed: Condvar,
    settled: CancellationSource,
}

enum Settlement {
    Pending,
    Settled(Option<AbandonedOutcome>),
}

impl AbandonedAction {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                settlement: Mutex::new(Settlement::Pending),
                changed: Condvar::new(),
                settled: CancellationSource::new(),
            }),
        }
    }

    /// Returns `true` once the action has ended.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(*self.inner.settlement.lock(), Settlement::Settled(_))
    }

    /// Blocks until the action ends or `timeout` elapses.
    ///
    /// Returns `true` if the action has ended.
    pub fn wait_settled(&self, timeout: Duration) -> bool {
        let mut settlement = self.inner.settlement.lock();
        if matches!(*settlement, Settlement::Pending) {
            _ = self
                .inner
                .changed
                .wait_while_for(&mut settlement, |settlement| matches!(settlement, Settlement::Pending), timeout);
        }

        matches!(*settlement, Settlement::Settled(_))
    }

    /// Returns a future that completes once the action has ended.
    pub fn settled(&self) -> WaitForCancellation {
        self.inner.settled.token().cancelled()
    }

    /// Takes the outcome out of the handle.
    ///
    /// Returns `None` while the action is still running, and on every call after the first
    /// successful one.
    #[must_use]
    pub fn take_outcome(&self) -> Option<AbandonedOutcome> {
        match &mut *self.inner.settlement.lock() {
            Settlement::Settled(outcome) => outcome.take(),
            Settlement::Pending => None,
        }
    }

    pub(crate) fn settle(&self, outcome: AbandonedOutcome) {
        {
            let mut settlement = self.inner.settlement.lock();
            if matches!(*settlement, Settlement::Settled(_)) {
                return;
            }

            *settlement = Settlement::Settled(Some(outcome));
            self.inner.changed.notify_all();
        }

        self.inner.settled.cancel();
    }
}

impl Debug for AbandonedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbandonedAction").field("is_settled", &self.is_settled()).finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::io;

    use futures::FutureExt;

    use super::*;

    fn cancelled() -> Cancelled {
        let source = CancellationSource::new();
        source.cancel();
        Cancelled::new(&source.token())
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(AbandonedAction: Send, Sync, Clone, Debug);
        static_assertions::assert_impl_all!(AbandonedOutcome: Send, Debug);
    }

    #[test]
    fn from_result_classifies() {
        let completed = AbandonedOutcome::from_result::<u32, Cancelled>(Ok(Ok(1)));
        let cancelled = AbandonedOutcome::from_result::<u32, Cancelled>(Ok(Err(cancelled())));
        let failed = AbandonedOutcome::from_result::<u32, Box<dyn std::error::Error + Send + Sync>>(Ok(Err("boom".into())));
        let panicked = AbandonedOutcome::from_result::<u32, Cancelled>(Err(Box::new("oops")));

        assert_eq!(completed.as_str(), "completed");
        assert_eq!(cancelled.as_str(), "cancelled");
        assert_eq!(failed.as_str(), "failed");
        assert_eq!(panicked.as_str(), "panicked");
        assert!(!completed.is_faulted());
        assert!(!cancelled.is_faulted());
        assert!(failed.is_faulted());
        assert!(panicked.is_faulted());
    }

    #[test]
    fn downcast_error_recovers_action_error() {
        let outcome = AbandonedOutcome::Failed(Box::new(io::Error::other("disk on fire")));

        let error = outcome.downcast_error::<io::Error>().unwrap();

        assert_eq!(error.to_string(), "disk on fire");
        assert!(outcome.downcast_error::<String>().is_none());
    }

    #[test]
    fn panic_message_ok() {
        assert_eq!(AbandonedOutcome::Panicked(Box::new("static")).panic_message(), Some("static"));
        assert_eq!(
            AbandonedOutcome::Panicked(Box::new("owned".to_string())).panic_message(),
            Some("owned")
        );
        assert!(AbandonedOutcome::Panicked(Box::new(5)).panic_message().is_none());
        assert!(AbandonedOutcome::Completed.panic_message().is_none());
    }

    #[test]
    fn settles_once() {
        let action = AbandonedAction::new();
        assert!(!action.is_settled());
        assert!(action.take_outcome().is_none());

        action.settle(AbandonedOutcome::Completed);
        action.settle(AbandonedOutcome::Panicked(Box::new("ignored")));

        assert!(action.is_settled());
        assert!(matches!(action.take_outcome(), Some(AbandonedOutcome::Completed)));
        assert!(action.take_outcome().is_none());
    }

    #[test]
    fn wait_settled_times_out_while_pending() {
        let action = AbandonedAction::new();

        assert!(!action.wait_settled(Duration::from_millis(5)));
    }

    #[test]
    fn wait_settled_wakes_on_settle() {
        let action = AbandonedAction::new();
        let settler = action.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            settler.settle(AbandonedOutcome::Cancelled(cancelled()));
        });

        assert!(action.wait_settled(Duration::from_secs(10)));
        handle.join().unwrap();
    }

    #[test]
    fn settled_future_completes() {
        let action = AbandonedAction::new();
        let mut settled = action.settled();

        assert!((&mut settled).now_or_never().is_none());
        action.settle(AbandonedOutcome::Completed);

        assert!(settled.now_or_never().is_some());
    }

    #[test]
    fn debug_ok() {
        assert_eq!(format!("{:?}", AbandonedAction::new()), "AbandonedAction { is_settled: false }");
    }
}
