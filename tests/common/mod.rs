//! Test utilities for otelboot integration tests.
//!
//! Provides:
//! - A recording installer standing in for the process-wide globals
//! - Config helpers

#![allow(dead_code)]

use otelboot::bootstrap::propagator::PropagatorSet;
use otelboot::config::TelemetryConfig;
use otelboot::TelemetryGlobals;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::sync::Mutex;
use std::time::Duration;

/// Something the bootstrap installed, in installation order.
#[derive(Debug, Clone, PartialEq)]
pub enum Installed {
    Propagator(PropagatorSet),
    MeterProvider,
}

/// Records installations instead of touching process globals, so each test
/// gets a fresh, isolated view.
#[derive(Debug, Default)]
pub struct RecordingGlobals {
    events: Mutex<Vec<Installed>>,
}

impl RecordingGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Installed> {
        self.events.lock().expect("recorder poisoned").clone()
    }

    pub fn installed_propagator(&self) -> Option<PropagatorSet> {
        self.events().into_iter().find_map(|event| match event {
            Installed::Propagator(set) => Some(set),
            Installed::MeterProvider => None,
        })
    }

    pub fn meter_provider_installed(&self) -> bool {
        self.events().contains(&Installed::MeterProvider)
    }
}

impl TelemetryGlobals for RecordingGlobals {
    fn set_propagator(&self, propagators: &PropagatorSet) {
        self.events
            .lock()
            .expect("recorder poisoned")
            .push(Installed::Propagator(propagators.clone()));
    }

    fn set_meter_provider(&self, _provider: &SdkMeterProvider) {
        self.events
            .lock()
            .expect("recorder poisoned")
            .push(Installed::MeterProvider);
    }
}

/// Telemetry config with the given exporter and propagator selections and a
/// long export interval so periodic readers stay quiet during a test.
pub fn telemetry_config(exporters: Option<&str>, propagators: Option<&str>) -> TelemetryConfig {
    TelemetryConfig {
        metrics_exporter: exporters.map(str::to_string),
        propagators: propagators.map(str::to_string),
        export_interval: Some(Duration::from_secs(3600)),
        ..TelemetryConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_starts_empty() {
        let globals = RecordingGlobals::new();
        assert!(globals.events().is_empty());
        assert!(!globals.meter_provider_installed());
    }
}
