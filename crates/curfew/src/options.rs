// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

use crate::spawn::thread_spawner;
use crate::utils::TelemetryHelper;
use crate::{Deadlines, Spawner};

pub(crate) const DEFAULT_PIPELINE_NAME: &str = "default";

/// Shared configuration and dependencies for the timeout policies of a pipeline.
///
/// Pass the same `PolicyOptions` to every policy of a pipeline to share the deadline source,
/// the background spawner and the telemetry configuration. Unless replaced, deadlines come
/// from [`Deadlines::system`] and asynchronous pessimistic work runs on dedicated worker
/// threads.
///
/// # Examples
///
/// ```rust
/// use curfew::{Deadlines, PolicyOptions};
///
/// let options = PolicyOptions::new().deadlines(Deadlines::system()).name("checkout");
/// # let _ = options;
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PolicyOptions {
    deadlines: Deadlines,
    name: Cow<'static, str>,
    spawner: Spawner,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
    logs_enabled: bool,
}

impl PolicyOptions {
    /// Creates options backed by the system clock, named `"default"`, with telemetry disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deadlines: Deadlines::system(),
            name: Cow::Borrowed(DEFAULT_PIPELINE_NAME),
            spawner: thread_spawner(),
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            logs_enabled: false,
        }
    }

    /// Sets the deadline source used to arm timeouts.
    ///
    /// Accepts [`Deadlines`] or a [`tick::Clock`], such as one created from
    /// `tick::ClockControl` in tests.
    #[must_use]
    pub fn deadlines(mut self, deadlines: impl Into<Deadlines>) -> Self {
        self.deadlines = deadlines.into();
        self
    }

    /// Sets the pipeline name for telemetry correlation. Prefer `snake_case`.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the spawner used by asynchronous pessimistic policies.
    #[must_use]
    pub fn spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = spawner;
        self
    }

    /// Enables metrics reporting with the given OpenTelemetry meter provider.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    pub fn enable_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            meter: Some(crate::metrics::create_meter(provider)),
            ..self
        }
    }

    /// Enables structured logging of timeout events.
    #[must_use]
    #[cfg(any(feature = "logs", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "logs")))]
    pub fn enable_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    pub(crate) fn get_deadlines(&self) -> &Deadlines {
        &self.deadlines
    }

    pub(crate) fn get_spawner(&self) -> &Spawner {
        &self.spawner
    }

    #[cfg_attr(
        not(any(feature = "metrics", feature = "logs", test)),
        expect(unused_variables, reason = "unused when neither logs nor metrics are compiled in")
    )]
    pub(crate) fn create_telemetry(&self, strategy_name: Cow<'static, str>) -> TelemetryHelper {
        TelemetryHelper {
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(crate::metrics::create_resilience_event_counter),
            #[cfg(any(feature = "metrics", feature = "logs", test))]
            pipeline_name: self.name.clone(),
            #[cfg(any(feature = "metrics", feature = "logs", test))]
            strategy_name,
            logs_enabled: self.logs_enabled,
        }
    }
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self::new()
    }
}
