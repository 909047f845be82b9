//! Application-side observability.
//!
//! Provides:
//! - Structured logging via `tracing`
//! - Request instruments registered against the bootstrapped meter provider

pub mod instruments;
pub mod tracing;
