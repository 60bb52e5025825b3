// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::Mutex;
use tick::Delay;

use super::token::{Registration, TokenState};
use crate::CancellationToken;

/// Requests cancellation of the tokens it hands out.
///
/// A source can be *linked* to other tokens with [`CancellationSource::linked`]: the linked
/// source is cancelled as soon as any of them is. Dropping a linked source removes its
/// callbacks from those tokens, so long-lived tokens do not accumulate listeners.
///
/// # Examples
///
/// ```rust
/// use curfew::CancellationSource;
///
/// let caller = CancellationSource::new();
/// let deadline = CancellationSource::new();
/// let combined = CancellationSource::linked(&[&caller.token(), &deadline.token()]);
///
/// deadline.cancel();
///
/// assert!(combined.is_cancelled());
/// assert!(!caller.is_cancelled());
/// ```
pub struct CancellationSource {
    state: Arc<TokenState>,
    links: Vec<Registration>,
    // Armed deadlines; dropping a delay unregisters its timer from the clock.
    delays: Mutex<Vec<Delay>>,
}

impl CancellationSource {
    /// Creates a source that is cancelled only through [`cancel`][Self::cancel].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TokenState::new(),
            links: Vec::new(),
            delays: Mutex::new(Vec::new()),
        }
    }

    /// Creates a source that is cancelled when any of `parents` is cancelled.
    ///
    /// A parent that is already cancelled cancels the new source immediately.
    #[must_use]
    pub fn linked(parents: &[&CancellationToken]) -> Self {
        let state = TokenState::new();
        let links = parents
            .iter()
            .filter(|parent| parent.can_be_cancelled())
            .map(|parent| {
                let child = CancellationToken::from_state(Arc::clone(&state)).downgrade();
                parent.on_cancel(move || child.cancel())
            })
            .collect();

        Self {
            state,
            links,
            delays: Mutex::new(Vec::new()),
        }
    }

    /// Returns a token observing this source.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken::from_state(Arc::clone(&self.state))
    }

    /// Requests cancellation.
    ///
    /// Callbacks registered on this source's tokens run on the calling thread before this
    /// method returns. Repeated calls have no further effect.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Keeps the timer behind `delay` registered until this source is dropped.
    pub(crate) fn hold_delay(&self, delay: Delay) {
        self.delays.lock().push(delay);
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &TokenState {
        &self.state
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for CancellationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSource")
            .field("is_cancelled", &self.is_cancelled())
            .field("links", &self.links.len())
            .field("deadlines", &self.delays.lock().len())
            .finish()
    }
}
