// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::{Condvar, Mutex};

use crate::CancellationToken;

type Settle<R> = Box<dyn FnOnce(R) + Send>;

/// Hand-off slot between a pessimistic worker and the caller waiting for it.
///
/// The worker reports exactly once with [`complete`][Self::complete]. The caller either takes
/// the outcome or, once the deadline fires, [`abandons`][Self::abandon] the slot; an abandoned
/// slot forwards the outcome to the settle callback on the worker's thread instead.
pub(crate) struct Completion<R> {
    slot: Mutex<Slot<R>>,
    ready: Condvar,
}

enum Slot<R> {
    Running(Option<Waker>),
    Finished(R),
    Taken,
    Abandoned(Settle<R>),
}

impl<R: Send + 'static> Completion<R> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot::Running(None)),
            ready: Condvar::new(),
        })
    }

    /// Delivers the worker's outcome.
    pub(crate) fn complete(&self, outcome: R) {
        let mut slot = self.slot.lock();
        match mem::replace(&mut *slot, Slot::Taken) {
            Slot::Running(waker) => {
                *slot = Slot::Finished(outcome);
                self.ready.notify_all();
                drop(slot);

                if let Some(waker) = waker {
                    waker.wake();
                }
            }
            Slot::Abandoned(settle) => {
                drop(slot);
                settle(outcome);
            }
            previous => *slot = previous,
        }
    }

    /// Blocks until the worker completes or `timeout` is cancelled.
    ///
    /// Returns `None` when the deadline fired first. The caller token is deliberately not
    /// observed here: a worker that ignores it must still be waited for.
    pub(crate) fn wait(self: &Arc<Self>, timeout: &CancellationToken) -> Option<R> {
        let this = Arc::clone(self);
        let _registration = timeout.on_cancel(move || {
            let _slot = this.slot.lock();
            this.ready.notify_all();
        });

        let mut slot = self.slot.lock();
        loop {
            if matches!(*slot, Slot::Finished(_)) {
                return take_finished(&mut slot);
            }

            if timeout.is_cancelled() {
                return None;
            }

            self.ready.wait(&mut slot);
        }
    }

    /// Returns a future that resolves with the worker's outcome.
    pub(crate) fn outcome(&self) -> Outcome<'_, R> {
        Outcome { completion: self }
    }

    /// Switches the slot to abandoned so that a late outcome goes to `settle`.
    ///
    /// # Errors
    ///
    /// Hands the outcome back if the worker finished in the meantime; the caller should then
    /// treat the call as completed.
    pub(crate) fn abandon(&self, settle: impl FnOnce(R) + Send + 'static) -> Result<(), R> {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Finished(_)) {
            return take_finished(&mut slot).map_or(Ok(()), Err);
        }

        *slot = Slot::Abandoned(Box::new(settle));
        Ok(())
    }

    /// Leaves the worker behind for good: its outcome goes to `settle` whenever it arrives,
    /// including an outcome that has already been delivered but not taken.
    pub(crate) fn detach(&self, settle: impl FnOnce(R) + Send + 'static) {
        let mut slot = self.slot.lock();
        if let Some(outcome) = take_finished(&mut slot) {
            drop(slot);
            settle(outcome);
            return;
        }

        if matches!(*slot, Slot::Running(_)) {
            *slot = Slot::Abandoned(Box::new(settle));
        }
    }

    fn poll_outcome(&self, cx: &mut Context<'_>) -> Poll<R> {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Finished(_)) {
            return take_finished(&mut slot).map_or(Poll::Pending, Poll::Ready);
        }

        if let Slot::Running(waker) = &mut *slot {
            match waker {
                Some(existing) => existing.clone_from(cx.waker()),
                None => *waker = Some(cx.waker().clone()),
            }
        }

        Poll::Pending
    }
}

fn take_finished<R>(slot: &mut Slot<R>) -> Option<R> {
    match mem::replace(slot, Slot::Taken) {
        Slot::Finished(outcome) => Some(outcome),
        other => {
            *slot = other;
            None
        }
    }
}

impl<R> Debug for Completion<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.lock() {
            Slot::Running(_) => "running",
            Slot::Finished(_) => "finished",
            Slot::Taken => "taken",
            Slot::Abandoned(_) => "abandoned",
        };

        f.debug_struct("Completion").field("state", &state).finish()
    }
}

/// Future returned by [`Completion::outcome`].
#[derive(Debug)]
pub(crate) struct Outcome<'a, R> {
    completion: &'a Completion<R>,
}

impl<R: Send + 'static> Future for Outcome<'_, R> {
    type Output = R;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.completion.poll_outcome(cx)
    }
}
