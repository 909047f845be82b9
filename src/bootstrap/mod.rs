//! Telemetry bootstrap.
//!
//! Stages run in a fixed order, each either advancing or rolling back
//! everything built so far:
//!
//! 1. [`resource`]: build the process resource
//! 2. [`propagator`]: resolve and install the context propagator
//! 3. [`exporter`] + [`provider`]: build exporters and the meter provider
//! 4. install the meter provider and hand back a [`Telemetry`] handle
//!
//! The propagator stays installed if a later stage fails: it owns no
//! external resources, and installing it is unconditional once it resolves.

pub mod exporter;
pub mod propagator;
pub mod provider;
pub mod resource;
pub mod shutdown;

use opentelemetry::global;
use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use exporter::{build_exporters, ExporterKind};
use propagator::{resolve_propagators, PropagatorSet};
use provider::assemble_meter_provider;
use resource::build_resource;
use shutdown::ShutdownChain;

/// Where the bootstrap publishes what it built.
///
/// Each slot is written once during setup and only read afterwards.
pub trait TelemetryGlobals: Send + Sync {
    fn set_propagator(&self, propagators: &PropagatorSet);
    fn set_meter_provider(&self, provider: &SdkMeterProvider);
}

/// Installs into the `opentelemetry::global` slots.
#[derive(Debug, Default, Clone, Copy)]
pub struct OtelGlobals;

impl TelemetryGlobals for OtelGlobals {
    fn set_propagator(&self, propagators: &PropagatorSet) {
        global::set_text_map_propagator(propagators.build());
    }

    fn set_meter_provider(&self, provider: &SdkMeterProvider) {
        global::set_meter_provider(provider.clone());
    }
}

/// A fully wired telemetry pipeline.
///
/// Owns the meter provider and the shutdown chain. Request handlers get
/// their meter and propagator from here rather than from process globals.
pub struct Telemetry {
    resource: Resource,
    propagators: PropagatorSet,
    propagator: Arc<TextMapCompositePropagator>,
    meter_provider: SdkMeterProvider,
    exporters: Vec<ExporterKind>,
    shutdown: ShutdownChain,
}

impl Telemetry {
    /// The resource every exported metric is attributed to.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn propagators(&self) -> &PropagatorSet {
        &self.propagators
    }

    /// The composite propagator for extracting and injecting request context.
    ///
    /// Clone the `Arc` to share it with request handlers.
    pub fn propagator(&self) -> &Arc<TextMapCompositePropagator> {
        &self.propagator
    }

    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.meter_provider
    }

    /// A meter from the owned provider.
    pub fn meter(&self, name: &'static str) -> Meter {
        self.meter_provider.meter(name)
    }

    /// Kinds of the exporters attached to the provider, in configuration order.
    pub fn exporters(&self) -> &[ExporterKind] {
        &self.exporters
    }

    /// Flush and release everything. Safe to call more than once.
    pub async fn shutdown(&mut self, deadline: Option<Instant>) -> Result<(), TelemetryError> {
        tracing::info!("Shutting down telemetry");
        self.shutdown.shutdown(deadline).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("resource", &self.resource)
            .field("propagators", &self.propagators)
            .field("exporters", &self.exporters)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

/// Build the telemetry pipeline from configuration and install it.
///
/// On failure everything constructed so far has already been torn down;
/// the caller does not need to clean up. Cancelling `cancel` aborts an
/// in-flight blocking stage with [`TelemetryError::Cancelled`].
pub async fn setup_telemetry<G>(
    config: &TelemetryConfig,
    globals: &G,
    cancel: &CancellationToken,
) -> Result<Telemetry, TelemetryError>
where
    G: TelemetryGlobals + ?Sized,
{
    let mut shutdown = ShutdownChain::new();

    let resource_config = config.resource.clone();
    let resource = run_blocking(cancel, "resource", move || build_resource(&resource_config)).await?;

    let propagators = resolve_propagators(config.propagators.as_deref())?;
    globals.set_propagator(&propagators);
    tracing::info!(propagators = %propagators, "Propagator installed");

    let exporter_config = config.metrics_exporter.clone();
    let interval = config.export_interval;
    let provider_resource = resource.clone();
    let built = run_blocking(cancel, "meter provider", move || {
        let exporters = build_exporters(exporter_config.as_deref())?;
        let kinds = exporters.iter().map(|e| e.kind()).collect::<Vec<_>>();
        Ok((assemble_meter_provider(provider_resource, exporters, interval), kinds))
    })
    .await;

    let (meter_provider, exporters) = match built {
        Ok(built) => built,
        Err(cause) => return Err(roll_back(&mut shutdown, cause).await),
    };

    let provider = meter_provider.clone();
    shutdown.push("meter provider", move || provider.shutdown());
    globals.set_meter_provider(&meter_provider);

    if exporters.is_empty() {
        tracing::info!("Meter provider installed, metric export disabled");
    } else {
        tracing::info!(exporters = ?exporters, "Meter provider installed");
    }

    Ok(Telemetry {
        resource,
        propagator: Arc::new(propagators.build()),
        propagators,
        meter_provider,
        exporters,
        shutdown,
    })
}

async fn roll_back(shutdown: &mut ShutdownChain, cause: TelemetryError) -> TelemetryError {
    tracing::error!(error = %cause, "Telemetry setup failed, rolling back");
    match shutdown.shutdown(None).await {
        Ok(()) => cause,
        Err(rollback) => TelemetryError::RolledBack {
            cause: Box::new(cause),
            rollback,
        },
    }
}

/// Run a blocking setup stage, giving up when `cancel` fires.
async fn run_blocking<T, F>(
    cancel: &CancellationToken,
    stage: &'static str,
    work: F,
) -> Result<T, TelemetryError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TelemetryError> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(TelemetryError::Cancelled { stage });
    }

    let task = tokio::task::spawn_blocking(work);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TelemetryError::Cancelled { stage }),
        joined = task => joined?,
    }
}
