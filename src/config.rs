//! Configuration parsing for the otelboot server.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides, including the standard `OTEL_*` variables
//! - Sensible defaults for quick start

use clap::{Args, Parser};
use std::time::Duration;

/// Environment variable selecting the metric exporters.
pub const ENV_METRICS_EXPORTER: &str = "OTEL_METRICS_EXPORTER";
/// Environment variable selecting the context propagators.
pub const ENV_PROPAGATORS: &str = "OTEL_PROPAGATORS";
/// Environment variable overriding `service.name`.
pub const ENV_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
/// Environment variable carrying freeform resource attributes.
pub const ENV_RESOURCE_ATTRIBUTES: &str = "OTEL_RESOURCE_ATTRIBUTES";

/// otelboot: a demo HTTP server wired to an environment-driven OpenTelemetry pipeline.
#[derive(Parser, Debug, Clone)]
#[command(name = "otelboot")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "OTELBOOT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "OTELBOOT_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a configuration for testing.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0, // Random port
            log_level: "debug".into(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            log_level: "info".into(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Raw telemetry settings.
///
/// Values are kept exactly as supplied; trimming, defaulting and validation
/// happen in the bootstrap resolvers so that an unset variable and a blank one
/// behave the same way.
#[derive(Args, Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Metric exporters: comma list of `otlp`, `console`, or `none` (default: no export)
    #[arg(long = "metrics-exporter", env = ENV_METRICS_EXPORTER)]
    pub metrics_exporter: Option<String>,

    /// Context propagators: comma list of `tracecontext`, `baggage`, or `none`
    #[arg(long = "propagators", env = ENV_PROPAGATORS)]
    pub propagators: Option<String>,

    #[command(flatten)]
    pub resource: ResourceConfig,

    /// Periodic export interval in milliseconds.
    ///
    /// When unset the SDK reads `OTEL_METRIC_EXPORT_INTERVAL` itself and falls
    /// back to its default if that value is unusable.
    #[arg(long = "metric-export-interval", value_parser = parse_millis)]
    pub export_interval: Option<Duration>,
}

/// Inputs for the resource attribute set that come from configuration rather
/// than from probing the host.
#[derive(Args, Debug, Clone, Default)]
pub struct ResourceConfig {
    /// Logical service name, overrides `service.name` from resource attributes
    #[arg(long = "service-name", env = ENV_SERVICE_NAME)]
    pub service_name: Option<String>,

    /// Extra resource attributes as `key=value` pairs separated by commas
    #[arg(long = "resource-attributes", env = ENV_RESOURCE_ATTRIBUTES)]
    pub attributes: Option<String>,
}

fn parse_millis(raw: &str) -> Result<Duration, String> {
    let millis: u64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("expected milliseconds, got {raw:?}: {e}"))?;
    if millis == 0 {
        return Err("export interval must be greater than zero".to_string());
    }
    Ok(Duration::from_millis(millis))
}
