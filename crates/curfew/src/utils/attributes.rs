// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Key used to annotate the name of a resilience pipeline.
///
/// Values reported under this dimension should be short and concise, preferably in `snake_case`.
/// Examples: `user_auth`, `data_processing`, `payment_flow`.
pub(crate) const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Key used to annotate the name of a resilience strategy, which for this crate is the name
/// given to the timeout policy.
pub(crate) const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Key used to annotate the specific resilience event being emitted.
///
/// Examples: `timeout`, `abandoned_action_faulted`.
pub(crate) const EVENT_NAME: &str = "resilience.event.name";

/// Key used to annotate how the timeout was enforced: `optimistic` or `pessimistic`.
pub(crate) const TIMEOUT_STRATEGY: &str = "resilience.timeout.strategy";
