//! otelboot: a demo HTTP server with an environment-driven metrics pipeline.
//!
//! # Usage
//!
//! ```bash
//! OTEL_METRICS_EXPORTER=otlp \
//! OTEL_METRIC_EXPORT_INTERVAL=5000 \
//! OTEL_EXPORTER_OTLP_METRICS_ENDPOINT=http://localhost:4318/v1/metrics \
//! OTEL_SERVICE_NAME=myservice \
//! otelboot --port 3000
//! ```
//!
//! Environment variables:
//! - `OTELBOOT_HOST`, `OTELBOOT_PORT`: Address to listen on
//! - `OTEL_METRICS_EXPORTER`: `otlp`, `console`, both, or `none` (default: no export)
//! - `OTEL_PROPAGATORS`: `tracecontext`, `baggage`, or `none`
//! - `OTEL_SERVICE_NAME`, `OTEL_RESOURCE_ATTRIBUTES`: Resource overrides
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context as _;
use otelboot::config::Config;
use otelboot::observability::instruments::{InstrumentRegistry, RequestMetrics};
use otelboot::observability::tracing::init_tracing;
use otelboot::server::{run_server, AppState};
use otelboot::{setup_telemetry, OtelGlobals};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// How long telemetry gets to flush on exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Print startup banner with version and configuration.
fn print_banner(config: &Config, exporters: &str) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  otelboot v{}

  Configuration:
    Address:    {}:{}
    Exporters:  {}
    Log Level:  {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version, config.host, config.port, exporters, config.log_level
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing/logging
    init_tracing(&config.log_level);

    // Bootstrap telemetry; any failure here is fatal
    let cancel = CancellationToken::new();
    let mut telemetry = setup_telemetry(&config.telemetry, &OtelGlobals, &cancel)
        .await
        .context("failed to set up telemetry")?;

    let mut registry = InstrumentRegistry::new(telemetry.meter("otelboot"));
    let metrics =
        RequestMetrics::register(&mut registry).context("failed to register instruments")?;
    let state = AppState::new(metrics, telemetry.propagator().clone());

    let exporters = if telemetry.exporters().is_empty() {
        "none".to_string()
    } else {
        telemetry
            .exporters()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    };
    print_banner(&config, &exporters);

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler task
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                        }
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating shutdown...");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }

        let _ = shutdown_tx.send(true);
    });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen address")?;
    let served = run_server(addr, state, shutdown_rx).await;

    // Flush telemetry even when the server failed
    let deadline = tokio::time::Instant::now() + SHUTDOWN_TIMEOUT;
    if let Err(e) = telemetry.shutdown(Some(deadline)).await {
        tracing::error!(error = %e, "Telemetry shutdown incomplete");
    }

    served.map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!("otelboot shutdown complete");
    Ok(())
}
