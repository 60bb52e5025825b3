// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Arms deadlines on a [`tick::Clock`] and sleeps against it.

mod driver;

use std::fmt::{self, Debug};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use tick::{Clock, Delay};

use crate::{CancellationSource, CancellationToken, Cancelled, WaitForCancellation};

/// Arms deadlines and measures time for timeout policies.
///
/// Timeout policies never read the wall clock or sleep directly; they go through
/// `Deadlines`, which wraps a [`Clock`]. [`Deadlines::system`] uses the monotonic system
/// clock, whose timers are driven by a shared background thread. Any other clock can be
/// supplied through [`Deadlines::new`]: a clock made from `tick::ClockControl` moves only
/// when the test says so, and a clock from `Clock::new_tokio` is driven by the Tokio runtime.
///
/// Cloning is cheap; clones share the same notion of time.
///
/// # Examples
///
/// ```rust
/// # use std::time::Duration;
/// use curfew::{CancellationSource, Deadlines};
///
/// let deadlines = Deadlines::system();
/// let source = CancellationSource::new();
///
/// deadlines.cancel_after(&source, Duration::from_millis(10));
/// deadlines.sleep(Duration::from_millis(20), &source.token()).unwrap_err();
///
/// assert!(source.is_cancelled());
/// ```
#[derive(Clone)]
pub struct Deadlines {
    clock: Clock,
    // Present for the system clock only; unparked whenever a new timer is registered.
    driver: Option<Thread>,
}

impl Deadlines {
    /// Returns deadlines driven by the monotonic system clock.
    ///
    /// # Panics
    ///
    /// The first call panics if the operating system refuses to start the thread that drives
    /// the system clock's timers.
    #[must_use]
    pub fn system() -> Self {
        let system = driver::system();

        Self {
            clock: system.clock.clone(),
            driver: Some(system.thread.clone()),
        }
    }

    /// Returns deadlines that take their time from `clock`.
    ///
    /// Whoever created the clock is responsible for driving its timers.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use std::time::Duration;
    /// use curfew::{CancellationSource, Deadlines};
    /// use tick::ClockControl;
    ///
    /// let control = ClockControl::new();
    /// let deadlines = Deadlines::new(control.to_clock());
    /// let source = CancellationSource::new();
    ///
    /// deadlines.cancel_after(&source, Duration::from_secs(5));
    /// assert!(!source.is_cancelled());
    ///
    /// control.advance(Duration::from_secs(5));
    /// assert!(source.is_cancelled());
    /// ```
    #[must_use]
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            driver: None,
        }
    }

    /// The clock behind these deadlines.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Returns the current instant.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.clock.instant()
    }

    /// Cancels `source` once `after` has elapsed.
    ///
    /// A zero duration cancels the source before this method returns. A duration too large
    /// to be represented never fires. Dropping the source before the deadline disarms it.
    pub fn cancel_after(&self, source: &CancellationSource, after: Duration) {
        if after.is_zero() {
            source.cancel();
            return;
        }

        let mut delay = self.clock.delay(after);
        let waker = Waker::from(Arc::new(driver::CancelOnWake::new(source.token().downgrade())));

        // The first poll registers the timer; a clock that auto-advances may fire it right away.
        if Pin::new(&mut delay).poll(&mut Context::from_waker(&waker)).is_ready() {
            source.cancel();
            return;
        }

        source.hold_delay(delay);
        self.notify_driver();
    }

    /// Blocks the current thread for `duration`, or until `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `token` is cancelled before or during the sleep.
    pub fn sleep(&self, duration: Duration, token: &CancellationToken) -> Result<(), Cancelled> {
        token.check()?;

        let alarm = CancellationSource::new();
        self.cancel_after(&alarm, duration);
        park_until_either(&alarm.token(), token);

        token.check()
    }

    /// Returns a future that completes after `duration`, or fails once `token` is cancelled.
    ///
    /// Time starts counting when the future is first polled.
    pub fn sleep_async(&self, duration: Duration, token: &CancellationToken) -> Sleep {
        Sleep {
            delay: self.clock.delay(duration),
            driver: self.driver.clone(),
            token_wait: token.cancelled(),
            token: token.clone(),
        }
    }

    fn notify_driver(&self) {
        if let Some(driver) = &self.driver {
            driver.unpark();
        }
    }
}

impl Default for Deadlines {
    fn default() -> Self {
        Self::system()
    }
}

impl From<Clock> for Deadlines {
    fn from(clock: Clock) -> Self {
        Self::new(clock)
    }
}

impl From<&Clock> for Deadlines {
    fn from(clock: &Clock) -> Self {
        Self::new(clock)
    }
}

impl Debug for Deadlines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deadlines").field("system", &self.driver.is_some()).finish_non_exhaustive()
    }
}

fn park_until_either(first: &CancellationToken, second: &CancellationToken) {
    let current = thread::current();
    let _registrations = [first, second].map(|token| {
        let current = current.clone();
        token.on_cancel(move || current.unpark())
    });

    while !first.is_cancelled() && !second.is_cancelled() {
        thread::park();
    }
}

/// Future returned by [`Deadlines::sleep_async`].
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    delay: Delay,
    // Taken once the delay has registered its timer.
    driver: Option<Thread>,
    token_wait: WaitForCancellation,
    token: CancellationToken,
}

impl Future for Sleep {
    type Output = Result<(), Cancelled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if Pin::new(&mut this.token_wait).poll(cx).is_ready() {
            return Poll::Ready(Err(Cancelled::new(&this.token)));
        }

        let poll = Pin::new(&mut this.delay).poll(cx);
        if let Some(driver) = this.driver.take() {
            driver.unpark();
        }

        poll.map(Ok)
    }
}

impl Debug for Sleep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sleep").field("token", &self.token).finish_non_exhaustive()
    }
}
