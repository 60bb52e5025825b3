// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cell::RefCell;
use std::mem;
use std::sync::{Arc, OnceLock};
use std::task::Wake;
use std::thread::{self, Thread};
use std::time::Instant;

use tick::Clock;
use tick::runtime::{ClockDriver, InactiveClock};

use crate::cancel::WeakToken;

const DRIVER_THREAD_NAME: &str = "curfew-clock";

thread_local! {
    // Set on the driver thread only. Tokens fired while the clock advances its timers are
    // cancelled after the clock has released its timer lock.
    static FIRED: RefCell<Option<Vec<WeakToken>>> = const { RefCell::new(None) };
}

/// The process-wide system clock and the thread that drives its timers.
pub(super) struct SystemClock {
    pub(super) clock: Clock,
    pub(super) thread: Thread,
}

/// Returns the system clock, starting its driver thread on first use.
///
/// # Panics
///
/// Panics if the operating system refuses to start the driver thread.
pub(super) fn system() -> &'static SystemClock {
    static SYSTEM: OnceLock<SystemClock> = OnceLock::new();

    SYSTEM.get_or_init(|| {
        let (clock, driver) = InactiveClock::default().activate();
        let handle = thread::Builder::new()
            .name(DRIVER_THREAD_NAME.to_string())
            .spawn(move || drive(driver))
            .expect("the operating system refused to start the curfew clock thread");

        SystemClock {
            clock,
            thread: handle.thread().clone(),
        }
    })
}

#[cfg_attr(test, mutants::skip)] // Causes test timeout.
fn drive(mut driver: ClockDriver) {
    FIRED.set(Some(Vec::new()));

    loop {
        let next = driver.advance_timers(Instant::now());

        for token in FIRED.with_borrow_mut(|fired| fired.as_mut().map(mem::take).unwrap_or_default()) {
            token.cancel();
        }

        match next {
            Ok(Some(next)) => thread::park_timeout(next.saturating_duration_since(Instant::now())),
            Ok(None) => thread::park(),
            Err(_) => break,
        }
    }
}

/// Waker that cancels a token when its timer fires.
pub(super) struct CancelOnWake(WeakToken);

impl CancelOnWake {
    pub(super) fn new(target: WeakToken) -> Self {
        Self(target)
    }
}

impl Wake for CancelOnWake {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let deferred = FIRED.with_borrow_mut(|fired| fired.as_mut().map(|fired| fired.push(self.0.clone())).is_some());

        if !deferred {
            self.0.cancel();
        }
    }
}
