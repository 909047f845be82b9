//! otelboot: environment-driven OpenTelemetry metrics bootstrap.
//!
//! Turns a handful of `OTEL_*` variables into a wired metrics pipeline and
//! hands back one owned [`bootstrap::Telemetry`] handle.
//!
//! # Architecture
//!
//! - **Opt-in export**: no exporter runs unless `OTEL_METRICS_EXPORTER` selects one
//! - **All-or-nothing setup**: a failing stage rolls back everything built before it
//! - **Idempotent teardown**: shutdown merges every failure and is safe to repeat
//!
//! # Modules
//!
//! - [`bootstrap`]: Resource, propagator, exporter and provider setup
//! - [`config`]: CLI and environment configuration
//! - [`error`]: Error types
//! - [`observability`]: Logging setup and request instruments
//! - [`server`]: HTTP server setup

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // bootstrap::exporter::ExporterKind is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod observability;
pub mod server;

pub use bootstrap::{setup_telemetry, OtelGlobals, Telemetry, TelemetryGlobals};
pub use error::{ShutdownError, TelemetryError};
