// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::Cancelled;

type Callback = Box<dyn FnOnce() + Send>;

/// Observes whether cancellation has been requested.
///
/// Tokens are handed out by a [`CancellationSource`][crate::CancellationSource] and are cheap
/// to clone. A token can be polled with [`is_cancelled`][Self::is_cancelled], checked with
/// [`check`][Self::check], awaited with [`cancelled`][Self::cancelled], or observed with a
/// callback registered through [`on_cancel`][Self::on_cancel].
///
/// [`CancellationToken::none`] never reports cancellation.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Option<Arc<TokenState>>,
}

impl CancellationToken {
    /// Returns a token that is never cancelled.
    #[must_use]
    pub fn none() -> Self {
        Self { state: None }
    }

    pub(crate) fn from_state(state: Arc<TokenState>) -> Self {
        Self { state: Some(state) }
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.as_ref().is_some_and(|state| state.is_cancelled())
    }

    /// Returns `true` if this token is backed by a source and can therefore be cancelled.
    #[must_use]
    pub fn can_be_cancelled(&self) -> bool {
        self.state.is_some()
    }

    /// Fails with [`Cancelled`] if cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] observed on this token once it is cancelled.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() { Err(Cancelled::new(self)) } else { Ok(()) }
    }

    /// Returns a future that completes once cancellation is requested.
    ///
    /// The future never completes for [`CancellationToken::none`].
    #[must_use]
    pub fn cancelled(&self) -> WaitForCancellation {
        WaitForCancellation {
            token: self.clone(),
            listener: None,
        }
    }

    /// Registers a callback invoked once cancellation is requested.
    ///
    /// If the token is already cancelled, the callback runs immediately on the calling thread.
    /// Otherwise it runs on the thread that requests cancellation. Dropping the returned
    /// [`Registration`] before that removes the callback.
    ///
    /// When a deadline armed on a caller-supplied [`Clock`][tick::Clock] cancels the token, the
    /// callback runs while that clock advances its timers and must not use the same clock.
    pub fn on_cancel(&self, callback: impl FnOnce() + Send + 'static) -> Registration {
        let Some(state) = &self.state else {
            return Registration::empty();
        };

        match state.listen(Listener::Callback(Box::new(callback))) {
            Ok(id) => Registration {
                state: Arc::downgrade(state),
                id,
            },
            Err(Listener::Callback(callback)) => {
                callback();
                Registration::empty()
            }
            Err(Listener::Waker(_)) => Registration::empty(),
        }
    }

    /// Returns `true` if both tokens observe the same source.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (&self.state, &other.state) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub(crate) fn downgrade(&self) -> WeakToken {
        WeakToken(self.state.as_ref().map_or_else(Weak::new, Arc::downgrade))
    }
}

impl Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("can_be_cancelled", &self.can_be_cancelled())
            .field("is_cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A token reference that does not keep its source's state alive.
#[derive(Debug, Clone)]
pub(crate) struct WeakToken(Weak<TokenState>);

impl WeakToken {
    /// Requests cancellation if the state is still alive.
    pub(crate) fn cancel(&self) {
        if let Some(state) = self.0.upgrade() {
            state.cancel();
        }
    }
}

pub(crate) struct TokenState {
    cancelled: AtomicBool,
    listeners: Mutex<Listeners>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

enum Listener {
    Callback(Callback),
    Waker(Waker),
}

impl TokenState {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            listeners: Mutex::new(Listeners::default()),
        })
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Marks the state cancelled and notifies every listener exactly once.
    ///
    /// The flag flips under the listener lock so that a listener is either registered before
    /// cancellation (and notified here) or refused by `listen`.
    pub(crate) fn cancel(&self) {
        let entries = {
            let mut listeners = self.listeners.lock();
            if self.cancelled.swap(true, Ordering::AcqRel) {
                return;
            }
            mem::take(&mut listeners.entries)
        };

        for (_, listener) in entries {
            match listener {
                Listener::Callback(callback) => callback(),
                Listener::Waker(waker) => waker.wake(),
            }
        }
    }

    /// Adds a listener, handing it back if cancellation was already requested.
    fn listen(&self, listener: Listener) -> Result<u64, Listener> {
        let mut listeners = self.listeners.lock();
        if self.is_cancelled() {
            return Err(listener);
        }

        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, listener));
        Ok(id)
    }

    /// Replaces the waker registered under `id`, or registers a new one.
    ///
    /// Returns `None` once cancellation was requested.
    fn listen_waker(&self, id: Option<u64>, waker: &Waker) -> Option<u64> {
        let mut listeners = self.listeners.lock();
        if self.is_cancelled() {
            return None;
        }

        if let Some(id) = id
            && let Some((_, Listener::Waker(existing))) = listeners.entries.iter_mut().find(|(entry, _)| *entry == id)
        {
            existing.clone_from(waker);
            return Some(id);
        }

        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Listener::Waker(waker.clone())));
        Some(id)
    }

    fn forget(&self, id: u64) {
        let removed = {
            let mut listeners = self.listeners.lock();
            listeners
                .entries
                .iter()
                .position(|(entry, _)| *entry == id)
                .map(|index| listeners.entries.swap_remove(index))
        };

        // dropped outside the lock, a callback may own other tokens' registrations
        drop(removed);
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }
}

/// Keeps a callback registered with [`CancellationToken::on_cancel`].
///
/// Dropping the registration removes the callback if it has not run yet.
#[must_use = "dropping the registration removes the callback"]
pub struct Registration {
    state: Weak<TokenState>,
    id: u64,
}

impl Registration {
    fn empty() -> Self {
        Self { state: Weak::new(), id: 0 }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.forget(self.id);
        }
    }
}

impl Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

/// Future returned by [`CancellationToken::cancelled`].
#[must_use = "futures do nothing unless polled"]
pub struct WaitForCancellation {
    token: CancellationToken,
    listener: Option<u64>,
}

impl Future for WaitForCancellation {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(state) = &this.token.state else {
            return Poll::Pending;
        };

        match state.listen_waker(this.listener, cx.waker()) {
            Some(id) => {
                this.listener = Some(id);
                Poll::Pending
            }
            None => {
                this.listener = None;
                Poll::Ready(())
            }
        }
    }
}

impl Drop for WaitForCancellation {
    fn drop(&mut self) {
        if let (Some(state), Some(id)) = (&self.token.state, self.listener) {
            state.forget(id);
        }
    }
}

impl Debug for WaitForCancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitForCancellation").field("token", &self.token).finish()
    }
}
