// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Per-policy telemetry configuration resolved from [`PolicyOptions`][crate::PolicyOptions].
#[derive(Debug, Clone)]
pub(crate) struct TelemetryHelper {
    #[cfg(any(feature = "metrics", feature = "logs", test))]
    pub(crate) pipeline_name: std::borrow::Cow<'static, str>,
    #[cfg(any(feature = "metrics", feature = "logs", test))]
    pub(crate) strategy_name: std::borrow::Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    #[cfg_attr(
        not(any(feature = "logs", test)),
        expect(dead_code, reason = "only read when logs are compiled in")
    )]
    pub(crate) logs_enabled: bool,
}

#[cfg(any(feature = "metrics", test))]
impl TelemetryHelper {
    pub(crate) fn metrics_enabled(&self) -> bool {
        self.event_reporter.is_some()
    }

    pub(crate) fn report_metrics(&self, attributes: &[opentelemetry::KeyValue]) {
        if let Some(reporter) = &self.event_reporter {
            reporter.add(1, attributes);
        }
    }
}
