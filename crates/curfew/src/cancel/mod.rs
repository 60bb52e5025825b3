// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cooperative cancellation primitives.
//!
//! A [`CancellationSource`] requests cancellation; the [`CancellationToken`]s it hands out
//! observe it. Actions executed through a timeout policy receive a token that is cancelled
//! when either the caller's token or the policy's deadline fires.

mod source;
mod token;

pub use source::CancellationSource;
pub(crate) use token::WeakToken;
pub use token::{CancellationToken, Registration, WaitForCancellation};
