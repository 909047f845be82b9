//! Meter provider assembly.
//!
//! Each exporter gets its own `PeriodicReader`, so every exporter exports on
//! an independent timer. The period defaults to the SDK default (or
//! `OTEL_METRIC_EXPORT_INTERVAL`, which the SDK reads itself) unless an
//! explicit interval is configured.

use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;
use std::time::Duration;

use super::exporter::MetricsExporter;

/// Bind the resource and one periodic reader per exporter into a provider.
///
/// With no exporters the provider is still valid: instruments work, nothing
/// is exported.
pub fn assemble_meter_provider(
    resource: Resource,
    exporters: Vec<MetricsExporter>,
    interval: Option<Duration>,
) -> SdkMeterProvider {
    let mut builder = SdkMeterProvider::builder().with_resource(resource);

    for exporter in exporters {
        let kind = exporter.kind();
        builder = match exporter {
            MetricsExporter::Otlp(exporter) => with_periodic_reader(builder, exporter, interval),
            MetricsExporter::Console(exporter) => {
                with_periodic_reader(builder, exporter, interval)
            }
        };
        tracing::debug!(exporter = %kind, ?interval, "Periodic reader attached");
    }

    builder.build()
}

fn with_periodic_reader<E>(
    builder: MeterProviderBuilder,
    exporter: E,
    interval: Option<Duration>,
) -> MeterProviderBuilder
where
    E: PushMetricExporter,
{
    let mut reader = PeriodicReader::builder(exporter);
    if let Some(interval) = interval {
        reader = reader.with_interval(interval);
    }
    builder.with_reader(reader.build())
}
