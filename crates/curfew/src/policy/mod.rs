// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Timeout policies for blocking and asynchronous actions.
//!
//! Both policies are configured through [`TimeoutBuilder`] and share their semantics. They
//! differ only in how the action is invoked and how a pessimistic unit of work is run: on a
//! dedicated thread for [`TimeoutPolicy`], through the configured [`Spawner`][crate::Spawner]
//! for [`AsyncTimeoutPolicy`].

mod args;
mod async_policy;
mod builder;
mod callbacks;
mod sync_policy;

pub use args::{OnAbandonedArgs, OnTimeoutArgs};
pub use async_policy::AsyncTimeoutPolicy;
pub use builder::TimeoutBuilder;
pub(crate) use callbacks::{OnAbandoned, OnTimeout, OnTimeoutAsync, TimeoutProvider};
pub use sync_policy::TimeoutPolicy;
