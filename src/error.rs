//! Error types for telemetry bootstrap and teardown.

use std::fmt;
use thiserror::Error;

/// Boxed error from an underlying SDK or exporter crate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by [`crate::bootstrap::setup_telemetry`] and the
/// [`crate::bootstrap::Telemetry`] handle.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// An environment value is outside its recognised vocabulary.
    #[error("unsupported value {token:?} in {key}={value}")]
    Configuration {
        key: &'static str,
        value: String,
        token: String,
    },

    /// A required resource probe failed.
    #[error("Failed to build resource: {0}")]
    Resource(String),

    /// A selected exporter could not be constructed.
    #[error("Failed to construct {exporter} metric exporter: {source}")]
    ExporterConstruction {
        exporter: &'static str,
        #[source]
        source: BoxError,
    },

    /// An instrument name is malformed or conflicts with an earlier registration.
    #[error("Invalid instrument: {0}")]
    Instrument(String),

    /// Setup was cancelled before the named stage completed.
    #[error("Telemetry setup cancelled during {stage}")]
    Cancelled { stage: &'static str },

    /// A blocking setup task panicked or was aborted.
    #[error("Telemetry setup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Bootstrap failed and rolling back what was built also failed.
    #[error("{cause}; rollback also failed: {rollback}")]
    RolledBack {
        cause: Box<TelemetryError>,
        rollback: ShutdownError,
    },

    /// One or more teardown steps failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

impl TelemetryError {
    /// The configuration or bootstrap error at the root of this one.
    pub fn root_cause(&self) -> &TelemetryError {
        match self {
            TelemetryError::RolledBack { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// A single failed teardown step.
#[derive(Debug)]
pub struct TeardownFailure {
    /// Name the step was registered under.
    pub step: &'static str,
    pub source: BoxError,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.source)
    }
}

/// Every failure collected during one pass over the shutdown chain.
///
/// Never short-circuits: a failing step does not prevent later steps from
/// running. `timed_out` is set when the deadline expired before all steps
/// completed.
#[derive(Debug, Default)]
pub struct ShutdownError {
    pub failures: Vec<TeardownFailure>,
    pub timed_out: bool,
}

impl ShutdownError {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty() && !self.timed_out
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shutdown failed")?;
        if self.timed_out {
            write!(f, " (deadline exceeded)")?;
        }
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ShutdownError {}
