// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// How a timeout policy reclaims control once the deadline passes.
///
/// | Strategy | Action must observe the token | Caller bounded by the deadline | Background work left behind |
/// |----------|-------------------------------|--------------------------------|-----------------------------|
/// | [`Optimistic`][TimeoutStrategy::Optimistic] | yes | only if the action cooperates | never |
/// | [`Pessimistic`][TimeoutStrategy::Pessimistic] | no | always | yes, until the action ends on its own |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimeoutStrategy {
    /// Trusts the action to honor the cancellation token it receives.
    ///
    /// The action runs on the caller's thread (or inside the caller's future). When the
    /// deadline passes, the token is cancelled and the action is expected to stop with a
    /// [`Cancelled`][crate::Cancelled] error, which the policy turns into a
    /// [`TimeoutRejected`][crate::TimeoutRejected]. An action that ignores the token is not
    /// interrupted.
    #[default]
    Optimistic,

    /// Enforces the deadline whether or not the action cooperates.
    ///
    /// The action runs as a separate unit of work. When the deadline passes, the caller stops
    /// waiting for it and the unit is abandoned: it keeps running, and its eventual outcome is
    /// delivered to the [`AbandonedAction`][crate::AbandonedAction] handed to the on-timeout
    /// hook.
    Pessimistic,
}

impl TimeoutStrategy {
    /// Returns a stable `snake_case` name used in telemetry.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Optimistic => "optimistic",
            Self::Pessimistic => "pessimistic",
        }
    }
}
