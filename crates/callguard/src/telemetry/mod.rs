// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reporting of resilience events as `tracing` events and OpenTelemetry counters.
//!
//! Log events are named `callguard.<policy>.<event>` and carry the wrapper name in the
//! `wrapper.name` field. Metrics are reported through a single `resilience.event` counter with
//! the [`WRAPPER_NAME`] and [`EVENT_NAME`] attributes.

use std::borrow::Cow;

#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// Attribute key carrying the wrapper name.
#[cfg(any(feature = "metrics", test))]
pub(crate) const WRAPPER_NAME: &str = "resilience.wrapper.name";

/// Attribute key carrying the event name.
#[cfg(any(feature = "metrics", test))]
pub(crate) const EVENT_NAME: &str = "resilience.event.name";

/// A resilience event worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    CacheHit,
    CacheMiss,
    Coalesced,
    DeadlineExceeded,
    CircuitRejected,
    CircuitOpened,
    CircuitHalfOpened,
    CircuitClosed,
}

impl Event {
    #[cfg_attr(
        not(any(feature = "logs", feature = "metrics", test)),
        expect(dead_code, reason = "names are only read by reporters")
    )]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CacheHit => "cache_hit",
            Self::CacheMiss => "cache_miss",
            Self::Coalesced => "coalesced",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::CircuitRejected => "circuit_rejected",
            Self::CircuitOpened => "circuit_opened",
            Self::CircuitHalfOpened => "circuit_half_opened",
            Self::CircuitClosed => "circuit_closed",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Telemetry {
    pub(crate) wrapper_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    #[cfg(any(feature = "logs", test))]
    pub(crate) logs_enabled: bool,
}

impl Telemetry {
    pub fn new(wrapper_name: Cow<'static, str>) -> Self {
        Self {
            wrapper_name,
            ..Self::default()
        }
    }

    #[cfg(any(feature = "logs", test))]
    #[must_use]
    pub fn with_logs(mut self, enabled: bool) -> Self {
        self.logs_enabled = enabled;
        self
    }

    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn with_metrics(mut self, meter_provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        let meter = metrics::create_meter(meter_provider);
        self.event_reporter = Some(metrics::create_resilience_event_counter(&meter));
        self
    }

    #[cfg_attr(
        not(any(feature = "logs", feature = "metrics", test)),
        expect(unused_variables, reason = "events are dropped without a reporting feature")
    )]
    pub fn report(&self, event: Event) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(reporter) = &self.event_reporter {
            reporter.add(
                1,
                &[
                    opentelemetry::KeyValue::new(WRAPPER_NAME, self.wrapper_name.clone()),
                    opentelemetry::KeyValue::new(EVENT_NAME, event.as_str()),
                ],
            );
        }

        #[cfg(any(feature = "logs", test))]
        if self.logs_enabled {
            log(event, &self.wrapper_name);
        }
    }
}

#[cfg(any(feature = "logs", test))]
fn log(event: Event, wrapper_name: &str) {
    macro_rules! emit {
        ($name:literal, $level:ident, $wrapper_name:expr) => {
            tracing::event!(
                name: $name,
                tracing::Level::$level,
                wrapper.name = %$wrapper_name,
                resilience.event.name = event.as_str(),
            )
        };
    }

    match event {
        Event::CacheHit => emit!("callguard.cache.hit", DEBUG, wrapper_name),
        Event::CacheMiss => emit!("callguard.cache.miss", DEBUG, wrapper_name),
        Event::Coalesced => emit!("callguard.flight.coalesced", DEBUG, wrapper_name),
        Event::DeadlineExceeded => emit!("callguard.deadline.exceeded", WARN, wrapper_name),
        Event::CircuitRejected => emit!("callguard.circuit.rejected", WARN, wrapper_name),
        Event::CircuitOpened => emit!("callguard.circuit.opened", WARN, wrapper_name),
        Event::CircuitHalfOpened => emit!("callguard.circuit.half_opened", INFO, wrapper_name),
        Event::CircuitClosed => emit!("callguard.circuit.closed", INFO, wrapper_name),
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::KeyValue;
    use tracing_subscriber::util::SubscriberInitExt;

    use super::testing::{LogCapture, MetricTester};
    use super::*;

    #[test]
    fn event_names() {
        assert_eq!(Event::CacheHit.as_str(), "cache_hit");
        assert_eq!(Event::CacheMiss.as_str(), "cache_miss");
        assert_eq!(Event::Coalesced.as_str(), "coalesced");
        assert_eq!(Event::DeadlineExceeded.as_str(), "deadline_exceeded");
        assert_eq!(Event::CircuitRejected.as_str(), "circuit_rejected");
        assert_eq!(Event::CircuitOpened.as_str(), "circuit_opened");
        assert_eq!(Event::CircuitHalfOpened.as_str(), "circuit_half_opened");
        assert_eq!(Event::CircuitClosed.as_str(), "circuit_closed");
    }

    #[test]
    fn attribute_keys() {
        assert_eq!(WRAPPER_NAME, "resilience.wrapper.name");
        assert_eq!(EVENT_NAME, "resilience.event.name");
    }

    #[test]
    fn report_emits_log_when_enabled() {
        let log_capture = LogCapture::new();
        let _guard = log_capture.subscriber().set_default();

        Telemetry::new("orders".into()).with_logs(true).report(Event::CircuitOpened);

        log_capture.assert_contains("callguard::telemetry");
        log_capture.assert_contains("WARN");
        log_capture.assert_contains("wrapper.name=orders");
        log_capture.assert_contains("resilience.event.name=\"circuit_opened\"");
    }

    #[test]
    fn report_is_silent_when_logs_disabled() {
        let log_capture = LogCapture::new();
        let _guard = log_capture.subscriber().set_default();

        Telemetry::new("orders".into()).report(Event::CacheHit);

        assert!(log_capture.output().is_empty());
    }

    #[test]
    fn report_emits_metrics_when_enabled() {
        let metrics = MetricTester::new();
        let telemetry = Telemetry::new("orders".into()).with_metrics(metrics.meter_provider());

        telemetry.report(Event::DeadlineExceeded);

        metrics.assert_attributes_contain(&[
            KeyValue::new(WRAPPER_NAME, "orders"),
            KeyValue::new(EVENT_NAME, "deadline_exceeded"),
        ]);
    }
}
