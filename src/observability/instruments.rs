//! Named instruments registered once at startup.
//!
//! Key metrics:
//! - test: counter incremented once per request to `/`

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::Context;
use std::collections::HashMap;

use crate::error::TelemetryError;

/// Name of the per-request counter.
pub const REQUEST_COUNTER: &str = "test";
const REQUEST_COUNTER_DESCRIPTION: &str = "example counter";
const REQUEST_COUNTER_UNIT: &str = "{test}";

const MAX_NAME_LEN: usize = 255;

struct Registered {
    description: &'static str,
    unit: &'static str,
    counter: Counter<u64>,
}

/// Registry of counters created from one meter.
///
/// Registration is a startup-time operation, hence `&mut self`: the
/// instruments it hands out are what request handlers share.
pub struct InstrumentRegistry {
    meter: Meter,
    counters: HashMap<&'static str, Registered>,
}

impl InstrumentRegistry {
    pub fn new(meter: Meter) -> Self {
        Self {
            meter,
            counters: HashMap::new(),
        }
    }

    /// Create a `u64` counter, or return the existing one if it was already
    /// registered with the same description and unit.
    pub fn register_counter(
        &mut self,
        name: &'static str,
        description: &'static str,
        unit: &'static str,
    ) -> Result<Counter<u64>, TelemetryError> {
        validate_instrument_name(name)?;

        if let Some(existing) = self.counters.get(name) {
            if existing.description != description || existing.unit != unit {
                return Err(TelemetryError::Instrument(format!(
                    "{name:?} already registered with description {:?} and unit {:?}",
                    existing.description, existing.unit
                )));
            }
            return Ok(existing.counter.clone());
        }

        let counter = self
            .meter
            .u64_counter(name)
            .with_description(description)
            .with_unit(unit)
            .build();
        self.counters.insert(
            name,
            Registered {
                description,
                unit,
                counter: counter.clone(),
            },
        );
        tracing::debug!(name, unit, "Counter registered");
        Ok(counter)
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

/// Instrument names: an ASCII letter, then up to 254 ASCII alphanumerics or
/// `_`, `.`, `-`, `/`.
pub fn validate_instrument_name(name: &str) -> Result<(), TelemetryError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphabetic()
                && name.len() <= MAX_NAME_LEN
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'))
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(TelemetryError::Instrument(format!(
            "malformed instrument name {name:?}"
        )))
    }
}

/// Instruments used by the HTTP handler.
#[derive(Clone)]
pub struct RequestMetrics {
    requests: Counter<u64>,
}

impl RequestMetrics {
    pub fn register(registry: &mut InstrumentRegistry) -> Result<Self, TelemetryError> {
        Ok(Self {
            requests: registry.register_counter(
                REQUEST_COUNTER,
                REQUEST_COUNTER_DESCRIPTION,
                REQUEST_COUNTER_UNIT,
            )?,
        })
    }

    /// Count one request, recorded while the request's context is current.
    pub fn record_request(&self, cx: &Context) {
        let _guard = cx.clone().attach();
        self.requests.add(1, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::data::Sum;
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};

    fn provider_with(exporter: &InMemoryMetricExporter) -> SdkMeterProvider {
        SdkMeterProvider::builder()
            .with_reader(PeriodicReader::builder(exporter.clone()).build())
            .build()
    }

    #[test]
    fn test_valid_names() {
        for name in ["test", "http.server.requests", "a_b-c/d", "X1"] {
            assert!(validate_instrument_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_malformed_names() {
        let too_long = format!("a{}", "b".repeat(MAX_NAME_LEN));
        for name in ["", "1abc", "_abc", "has space", "emoji☃", too_long.as_str()] {
            assert!(
                matches!(validate_instrument_name(name), Err(TelemetryError::Instrument(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn test_conflicting_registration_fails() {
        let provider = SdkMeterProvider::builder().build();
        let mut registry = InstrumentRegistry::new(provider.meter("test"));

        registry.register_counter("requests", "all requests", "1").unwrap();
        assert!(registry.register_counter("requests", "all requests", "1").is_ok());
        assert_eq!(registry.len(), 1);

        let err = registry
            .register_counter("requests", "other description", "1")
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert!(registry.register_counter("requests", "all requests", "{req}").is_err());
    }

    #[test]
    fn test_record_request_counts_each_call() {
        let exporter = InMemoryMetricExporter::default();
        let provider = provider_with(&exporter);
        let mut registry = InstrumentRegistry::new(provider.meter("otelboot"));
        let metrics = RequestMetrics::register(&mut registry).unwrap();

        for _ in 0..3 {
            metrics.record_request(&Context::new());
        }
        provider.shutdown().unwrap();

        let finished = exporter.get_finished_metrics().unwrap();
        let metric = finished
            .iter()
            .flat_map(|rm| rm.scope_metrics.iter())
            .flat_map(|sm| sm.metrics.iter())
            .find(|m| m.name == REQUEST_COUNTER)
            .expect("request counter exported");

        assert_eq!(metric.description, REQUEST_COUNTER_DESCRIPTION);
        assert_eq!(metric.unit, REQUEST_COUNTER_UNIT);
        let sum = metric
            .data
            .as_any()
            .downcast_ref::<Sum<u64>>()
            .expect("counter aggregates to a sum");
        let total: u64 = sum.data_points.iter().map(|dp| dp.value).sum();
        assert_eq!(total, 3);
    }
}
