// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{AbandonedAction, Cancelled, Context, TimeoutDuration, TimeoutStrategy};

/// Arguments passed to the on-timeout hooks.
///
/// Contains the details of a timed-out execution: the caller's context, the timeout that was
/// exceeded, and for pessimistic policies the handle of the abandoned action.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OnTimeoutArgs {
    pub(crate) context: Context,
    pub(crate) timeout: TimeoutDuration,
    pub(crate) strategy: TimeoutStrategy,
    pub(crate) abandoned: Option<AbandonedAction>,
    pub(crate) cause: Cancelled,
}

impl OnTimeoutArgs {
    /// Returns the context passed to the execution.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the timeout that was exceeded, as resolved for this execution.
    #[must_use]
    pub fn timeout(&self) -> TimeoutDuration {
        self.timeout
    }

    /// Returns the strategy that enforced the timeout.
    #[must_use]
    pub fn strategy(&self) -> TimeoutStrategy {
        self.strategy
    }

    /// Returns the action left running in the background.
    ///
    /// Always `Some` for pessimistic policies and always `None` for optimistic ones.
    #[must_use]
    pub fn abandoned(&self) -> Option<&AbandonedAction> {
        self.abandoned.as_ref()
    }

    /// Returns the cancellation that triggered the timeout.
    #[must_use]
    pub fn cause(&self) -> &Cancelled {
        &self.cause
    }
}

/// Arguments passed to the on-abandoned hook.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OnAbandonedArgs {
    pub(crate) context: Context,
    pub(crate) timeout: TimeoutDuration,
}

impl OnAbandonedArgs {
    /// Returns the context passed to the execution that abandoned the action.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the timeout the abandoned action exceeded.
    #[must_use]
    pub fn timeout(&self) -> TimeoutDuration {
        self.timeout
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::CancellationSource;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(OnTimeoutArgs: Send, Sync, Clone);
        static_assertions::assert_impl_all!(OnAbandonedArgs: Send, Sync, Clone);
    }

    #[test]
    fn accessors_ok() {
        let source = CancellationSource::new();
        source.cancel();
        let context = Context::new();
        let args = OnTimeoutArgs {
            context: context.clone(),
            timeout: TimeoutDuration::from_millis(20),
            strategy: TimeoutStrategy::Pessimistic,
            abandoned: Some(AbandonedAction::new()),
            cause: Cancelled::new(&source.token()),
        };

        assert!(args.context().ptr_eq(&context));
        assert_eq!(args.timeout(), TimeoutDuration::from_millis(20));
        assert_eq!(args.strategy(), TimeoutStrategy::Pessimistic);
        assert!(args.abandoned().is_some());
        assert!(args.cause().token().same_as(&source.token()));
    }
}
