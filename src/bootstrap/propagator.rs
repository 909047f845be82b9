//! Context propagator resolution from `OTEL_PROPAGATORS`.
//!
//! - Unset or blank: `tracecontext,baggage`
//! - `none`: an empty composite, which neither reads nor writes headers
//! - Otherwise: a comma list resolved in order

use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use std::fmt;

use crate::config::ENV_PROPAGATORS;
use crate::error::TelemetryError;

/// A single named propagation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagatorKind {
    /// W3C Trace Context (`traceparent`, `tracestate`).
    TraceContext,
    /// W3C Baggage (`baggage`).
    Baggage,
}

impl PropagatorKind {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "tracecontext" => Some(Self::TraceContext),
            "baggage" => Some(Self::Baggage),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TraceContext => "tracecontext",
            Self::Baggage => "baggage",
        }
    }

    fn build(self) -> Box<dyn TextMapPropagator + Send + Sync> {
        match self {
            Self::TraceContext => Box::new(TraceContextPropagator::new()),
            Self::Baggage => Box::new(BaggagePropagator::new()),
        }
    }
}

impl fmt::Display for PropagatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of propagation strategies. Empty means no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagatorSet {
    kinds: Vec<PropagatorKind>,
}

impl PropagatorSet {
    /// The default composite: trace context, then baggage.
    pub fn default_set() -> Self {
        Self {
            kinds: vec![PropagatorKind::TraceContext, PropagatorKind::Baggage],
        }
    }

    /// The explicit no-op composite.
    pub fn none() -> Self {
        Self { kinds: Vec::new() }
    }

    pub fn kinds(&self) -> &[PropagatorKind] {
        &self.kinds
    }

    pub fn is_noop(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Build the composite propagator, preserving order.
    pub fn build(&self) -> TextMapCompositePropagator {
        TextMapCompositePropagator::new(self.kinds.iter().map(|kind| kind.build()).collect())
    }
}

impl fmt::Display for PropagatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kinds.is_empty() {
            return f.write_str("none");
        }
        for (i, kind) in self.kinds.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(kind.as_str())?;
        }
        Ok(())
    }
}

/// Resolve the propagator list from its raw configuration value.
///
/// Fails on the first unknown token without returning a partial set.
pub fn resolve_propagators(raw: Option<&str>) -> Result<PropagatorSet, TelemetryError> {
    let value = raw.map(str::trim).unwrap_or_default();

    if value.is_empty() {
        return Ok(PropagatorSet::default_set());
    }
    if value == "none" {
        return Ok(PropagatorSet::none());
    }

    let kinds = value
        .split(',')
        .map(|part| {
            let token = part.trim();
            PropagatorKind::from_token(token).ok_or_else(|| TelemetryError::Configuration {
                key: ENV_PROPAGATORS,
                value: value.to_string(),
                token: token.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PropagatorSet { kinds })
}
