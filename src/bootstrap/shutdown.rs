//! Ordered teardown of everything the bootstrap constructed.
//!
//! Steps run front to back. A failing step never stops the ones after it;
//! all failures are merged into one [`ShutdownError`]. The chain is drained
//! on the first call, so later calls are no-ops.

use tokio::time::Instant;

use crate::error::{BoxError, ShutdownError, TeardownFailure};

type Teardown = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'static>;

/// Registered teardown callbacks.
#[derive(Default)]
pub struct ShutdownChain {
    steps: Vec<(&'static str, Teardown)>,
}

impl ShutdownChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a teardown step. Steps run in registration order.
    pub fn push<F, E>(&mut self, step: &'static str, teardown: F)
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        let teardown: Teardown = Box::new(move || teardown().map_err(Into::<BoxError>::into));
        self.steps.push((step, teardown));
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every registered step once.
    ///
    /// Steps may block (provider shutdown flushes pending exports), so each
    /// runs on the blocking pool. If `deadline` passes, the failures
    /// collected so far are returned with `timed_out` set and the remaining
    /// steps are abandoned.
    pub async fn shutdown(&mut self, deadline: Option<Instant>) -> Result<(), ShutdownError> {
        let steps = std::mem::take(&mut self.steps);
        let mut error = ShutdownError::default();

        for (step, teardown) in steps {
            let task = tokio::task::spawn_blocking(teardown);
            let joined = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, task).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        tracing::warn!(step, "Shutdown deadline exceeded");
                        error.timed_out = true;
                        break;
                    }
                },
                None => task.await,
            };

            let result = joined.unwrap_or_else(|e| Err(Box::new(e) as BoxError));
            match result {
                Ok(()) => tracing::debug!(step, "Teardown step complete"),
                Err(source) => {
                    tracing::warn!(step, error = %source, "Teardown step failed");
                    error.failures.push(TeardownFailure { step, source });
                }
            }
        }

        if error.is_empty() {
            Ok(())
        } else {
            Err(error)
        }
    }
}

impl std::fmt::Debug for ShutdownChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|(step, _)| step))
            .finish()
    }
}
