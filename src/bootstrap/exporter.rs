//! Metric exporter selection from `OTEL_METRICS_EXPORTER`.
//!
//! Export is opt-in: unset, blank and `none` all select zero exporters.

use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use std::fmt;

use crate::config::ENV_METRICS_EXPORTER;
use crate::error::TelemetryError;

/// Which backend an exporter ships metrics to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterKind {
    /// OTLP over HTTP/protobuf, configured by `OTEL_EXPORTER_OTLP_*`.
    Otlp,
    /// Human-readable output on stdout.
    Console,
}

impl ExporterKind {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "otlp" => Some(Self::Otlp),
            "console" => Some(Self::Console),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Otlp => "otlp",
            Self::Console => "console",
        }
    }
}

impl fmt::Display for ExporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A constructed metric exporter, not yet attached to a reader.
pub enum MetricsExporter {
    Otlp(opentelemetry_otlp::MetricExporter),
    Console(opentelemetry_stdout::MetricExporter),
}

impl MetricsExporter {
    /// Construct one exporter of the given kind.
    pub fn build(kind: ExporterKind) -> Result<Self, TelemetryError> {
        match kind {
            ExporterKind::Otlp => opentelemetry_otlp::MetricExporter::builder()
                .with_http()
                .build()
                .map(Self::Otlp)
                .map_err(|e| TelemetryError::ExporterConstruction {
                    exporter: kind.as_str(),
                    source: Box::new(e),
                }),
            ExporterKind::Console => Ok(Self::Console(
                opentelemetry_stdout::MetricExporter::default(),
            )),
        }
    }

    pub fn kind(&self) -> ExporterKind {
        match self {
            Self::Otlp(_) => ExporterKind::Otlp,
            Self::Console(_) => ExporterKind::Console,
        }
    }

    /// Release an exporter that never got attached to a reader.
    fn discard(self) {
        let kind = self.kind();
        let result = match self {
            Self::Otlp(exporter) => exporter.shutdown(),
            Self::Console(exporter) => exporter.shutdown(),
        };
        if let Err(e) = result {
            tracing::warn!(exporter = %kind, error = %e, "Failed to shut down discarded exporter");
        }
    }
}

impl fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MetricsExporter").field(&self.kind()).finish()
    }
}

/// Construct every exporter selected by the raw configuration value, in order.
///
/// Tokens are handled left to right: an unknown token stops construction at
/// that point. If anything fails, the exporters already built by this call
/// are shut down before the error is returned, so the caller never holds a
/// partial list.
pub fn build_exporters(raw: Option<&str>) -> Result<Vec<MetricsExporter>, TelemetryError> {
    build_selected(raw, MetricsExporter::build, MetricsExporter::discard)
}

fn build_selected<T, B, D>(
    raw: Option<&str>,
    mut build: B,
    mut discard: D,
) -> Result<Vec<T>, TelemetryError>
where
    B: FnMut(ExporterKind) -> Result<T, TelemetryError>,
    D: FnMut(T),
{
    let value = raw.map(str::trim).unwrap_or_default();
    if value.is_empty() || value == "none" {
        tracing::debug!("No metric exporters configured, export disabled");
        return Ok(Vec::new());
    }

    let mut exporters = Vec::new();
    for part in value.split(',') {
        let token = part.trim();
        let built = ExporterKind::from_token(token)
            .ok_or_else(|| unsupported(value, token))
            .and_then(|kind| {
                let exporter = build(kind)?;
                tracing::debug!(exporter = %kind, "Metric exporter constructed");
                Ok(exporter)
            });

        match built {
            Ok(exporter) => exporters.push(exporter),
            Err(e) => {
                exporters.into_iter().for_each(&mut discard);
                return Err(e);
            }
        }
    }

    Ok(exporters)
}

fn unsupported(value: &str, token: &str) -> TelemetryError {
    TelemetryError::Configuration {
        key: ENV_METRICS_EXPORTER,
        value: value.to_string(),
        token: token.to_string(),
    }
}
