// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use uuid::Uuid;

type Property = Arc<dyn Any + Send + Sync>;

/// Caller-owned data that travels with a single execution.
///
/// A context carries an optional operation key, a correlation id generated when the context is
/// created, and a bag of typed properties. Timeout policies never modify it; they hand it to
/// the action, the timeout provider and every hook.
///
/// Cloning is cheap and clones share their data until one of them is modified.
///
/// # Examples
///
/// ```rust
/// use curfew::Context;
///
/// let context = Context::with_operation_key("get_user").with("tenant", "contoso");
///
/// assert_eq!(context.operation_key(), Some("get_user"));
/// assert_eq!(context.get::<&str>("tenant"), Some(&"contoso"));
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Clone)]
struct ContextInner {
    operation_key: Option<Cow<'static, str>>,
    correlation_id: Uuid,
    properties: HashMap<Cow<'static, str>, Property>,
}

impl Context {
    /// Creates an empty context with a fresh correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                operation_key: None,
                correlation_id: Uuid::new_v4(),
                properties: HashMap::new(),
            }),
        }
    }

    /// Creates an empty context identified by `operation_key`.
    #[must_use]
    pub fn with_operation_key(operation_key: impl Into<Cow<'static, str>>) -> Self {
        let mut context = Self::new();
        Arc::make_mut(&mut context.inner).operation_key = Some(operation_key.into());
        context
    }

    /// Returns the operation key, if one was given.
    #[must_use]
    pub fn operation_key(&self) -> Option<&str> {
        self.inner.operation_key.as_deref()
    }

    /// Returns the id generated when this context was created.
    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.inner.correlation_id
    }

    /// Returns this context with `value` stored under `key`.
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, key: impl Into<Cow<'static, str>>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: impl Into<Cow<'static, str>>, value: T) {
        Arc::make_mut(&mut self.inner).properties.insert(key.into(), Arc::new(value));
    }

    /// Returns the value stored under `key` if it has type `T`.
    #[must_use]
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.inner.properties.get(key).and_then(|value| value.downcast_ref())
    }

    /// Returns `true` if both contexts share the same data.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.inner.properties.keys().collect();
        keys.sort();

        f.debug_struct("Context")
            .field("operation_key", &self.inner.operation_key)
            .field("correlation_id", &self.inner.correlation_id)
            .field("properties", &keys)
            .finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Context: Send, Sync, Clone, Debug, Default);
    }

    #[test]
    fn new_has_unique_correlation_id() {
        let first = Context::new();
        let second = Context::new();

        assert_ne!(first.correlation_id(), second.correlation_id());
        assert!(first.operation_key().is_none());
    }

    #[test]
    fn get_requires_matching_type() {
        let context = Context::new().with("attempts", 3_u32);

        assert_eq!(context.get::<u32>("attempts"), Some(&3));
        assert!(context.get::<u64>("attempts").is_none());
        assert!(context.get::<u32>("missing").is_none());
    }

    #[test]
    fn clones_share_until_modified() {
        let context = Context::with_operation_key("op");
        let mut clone = context.clone();
        assert!(context.ptr_eq(&clone));

        clone.insert("key", "value");

        assert!(!context.ptr_eq(&clone));
        assert!(context.get::<&str>("key").is_none());
        assert_eq!(clone.operation_key(), Some("op"));
        assert_eq!(clone.correlation_id(), context.correlation_id());
    }

    #[test]
    fn debug_lists_sorted_keys() {
        let context = Context::new().with("b", 1).with("a", 2);

        let debug = format!("{context:?}");

        assert!(debug.contains("properties: [\"a\", \"b\"]"), "{debug}");
    }
}
