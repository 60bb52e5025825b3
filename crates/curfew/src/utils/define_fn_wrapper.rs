// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Generates a clonable, thread-safe wrapper around a user-supplied closure.
///
/// Policies store hooks and providers as `Arc<dyn Fn...>` so that a built policy can be cloned
/// and shared across threads, and so that the worker of a pessimistic call can keep a hook
/// alive after the caller has returned.
///
/// # Syntax
///
/// ```rust,ignore
/// define_fn_wrapper!(TypeName(Fn(args) -> ReturnType));
/// ```
///
/// # Example
///
/// ```rust,ignore
/// define_fn_wrapper!(TimeoutProvider(Fn(&Context) -> TimeoutDuration));
/// ```
///
/// This generates a `TimeoutProvider` struct with:
/// - `new<F>(f: F) -> Self` where `F: Fn(...) + Send + Sync + 'static`
/// - `call(&self, args...) -> ReturnType` to invoke the wrapped function
/// - `Clone` and `Debug` implementations
macro_rules! define_fn_wrapper {
    ($name:ident(Fn($($param_name:ident: $param_ty:ty),*) -> $return_ty:ty)) => {
        pub(crate) struct $name(std::sync::Arc<dyn Fn($($param_ty),*) -> $return_ty + Send + Sync>);

        impl $name {
            pub(crate) fn new<F>(f: F) -> Self
            where
                F: Fn($($param_ty),*) -> $return_ty + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(f))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) -> $return_ty {
                (self.0)($($param_name),*)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish()
            }
        }
    };

    // two parameters
    ($name:ident(Fn($param1:ty, $param2:ty) -> $return_ty:ty)) => {
        $crate::utils::define_fn_wrapper!($name(Fn(arg1: $param1, arg2: $param2) -> $return_ty));
    };

    ($name:ident(Fn($param1:ty, $param2:ty))) => {
        $crate::utils::define_fn_wrapper!($name(Fn(arg1: $param1, arg2: $param2) -> ()));
    };

    // one parameter
    ($name:ident(Fn($param1:ty) -> $return_ty:ty)) => {
        $crate::utils::define_fn_wrapper!($name(Fn(arg1: $param1) -> $return_ty));
    };

    ($name:ident(Fn($param1:ty))) => {
        $crate::utils::define_fn_wrapper!($name(Fn(arg1: $param1) -> ()));
    };
}

pub(crate) use define_fn_wrapper;
