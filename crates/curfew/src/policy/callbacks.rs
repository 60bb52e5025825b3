// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use futures::future::BoxFuture;

use super::{OnAbandonedArgs, OnTimeoutArgs};
use crate::{AbandonedOutcome, Context, TimeoutDuration};

crate::utils::define_fn_wrapper!(TimeoutProvider(Fn(&Context) -> TimeoutDuration));
crate::utils::define_fn_wrapper!(OnTimeout(Fn(&OnTimeoutArgs)));
crate::utils::define_fn_wrapper!(OnTimeoutAsync(Fn(OnTimeoutArgs) -> BoxFuture<'static, ()>));
crate::utils::define_fn_wrapper!(OnAbandoned(Fn(&AbandonedOutcome, &OnAbandonedArgs)));
