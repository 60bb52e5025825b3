// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logs and metrics emitted by timeout policies.

use crate::utils::TelemetryHelper;
use crate::{AbandonedOutcome, Context, TimeoutDuration, TimeoutStrategy};

#[cfg(any(feature = "metrics", test))]
pub(crate) const TIMEOUT_EVENT_NAME: &str = "timeout";
#[cfg(any(feature = "metrics", test))]
pub(crate) const ABANDONED_FAULTED_EVENT_NAME: &str = "abandoned_action_faulted";

#[cfg_attr(
    not(any(feature = "metrics", feature = "logs", test)),
    expect(unused_variables, reason = "unused when neither logs nor metrics are compiled in")
)]
pub(crate) fn report_timeout(telemetry: &TelemetryHelper, context: &Context, timeout: TimeoutDuration, strategy: TimeoutStrategy) {
    #[cfg(any(feature = "metrics", test))]
    if telemetry.metrics_enabled() {
        report_event(telemetry, TIMEOUT_EVENT_NAME, strategy);
    }

    #[cfg(any(feature = "logs", test))]
    if telemetry.logs_enabled {
        tracing::event!(
            name: "curfew.timeout",
            tracing::Level::WARN,
            pipeline.name = %telemetry.pipeline_name,
            strategy.name = %telemetry.strategy_name,
            timeout.strategy = strategy.as_str(),
            timeout.ms = timeout_millis(timeout),
            operation.key = context.operation_key().unwrap_or_default(),
            correlation.id = %context.correlation_id(),
        );
    }
}

#[cfg_attr(
    not(any(feature = "metrics", feature = "logs", test)),
    expect(unused_variables, reason = "unused when neither logs nor metrics are compiled in")
)]
pub(crate) fn report_abandoned(
    telemetry: &TelemetryHelper,
    context: &Context,
    timeout: TimeoutDuration,
    strategy: TimeoutStrategy,
    outcome: &AbandonedOutcome,
) {
    #[cfg(any(feature = "metrics", test))]
    if outcome.is_faulted() && telemetry.metrics_enabled() {
        report_event(telemetry, ABANDONED_FAULTED_EVENT_NAME, strategy);
    }

    #[cfg(any(feature = "logs", test))]
    if telemetry.logs_enabled {
        // tracing levels must be constant per callsite
        if outcome.is_faulted() {
            tracing::event!(
                name: "curfew.abandoned",
                tracing::Level::WARN,
                pipeline.name = %telemetry.pipeline_name,
                strategy.name = %telemetry.strategy_name,
                timeout.strategy = strategy.as_str(),
                timeout.ms = timeout_millis(timeout),
                abandoned.outcome = outcome.as_str(),
                operation.key = context.operation_key().unwrap_or_default(),
                correlation.id = %context.correlation_id(),
            );
        } else {
            tracing::event!(
                name: "curfew.abandoned",
                tracing::Level::DEBUG,
                pipeline.name = %telemetry.pipeline_name,
                strategy.name = %telemetry.strategy_name,
                timeout.strategy = strategy.as_str(),
                timeout.ms = timeout_millis(timeout),
                abandoned.outcome = outcome.as_str(),
                operation.key = context.operation_key().unwrap_or_default(),
                correlation.id = %context.correlation_id(),
            );
        }
    }
}

#[cfg(any(feature = "metrics", test))]
fn report_event(telemetry: &TelemetryHelper, event_name: &'static str, strategy: TimeoutStrategy) {
    use opentelemetry::KeyValue;

    use crate::utils::{EVENT_NAME, PIPELINE_NAME, STRATEGY_NAME, TIMEOUT_STRATEGY};

    telemetry.report_metrics(&[
        KeyValue::new(PIPELINE_NAME, telemetry.pipeline_name.clone()),
        KeyValue::new(STRATEGY_NAME, telemetry.strategy_name.clone()),
        KeyValue::new(EVENT_NAME, event_name),
        KeyValue::new(TIMEOUT_STRATEGY, strategy.as_str()),
    ]);
}

#[cfg(any(feature = "logs", test))]
fn timeout_millis(timeout: TimeoutDuration) -> u128 {
    timeout.as_duration().map_or(0, |duration| duration.as_millis())
}
