//! HTTP server setup and lifecycle.
//!
//! Serves a single route:
//! - `/` - increments the request counter and returns a static HTML page

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::get,
    Router,
};
use opentelemetry::propagation::{Extractor, TextMapCompositePropagator, TextMapPropagator};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::observability::instruments::RequestMetrics;

const INDEX_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head>
<title>otel</title>
</head>
<body>
	<p>
	Visit <a href="http://localhost:9090/graph?g0.expr=test_total" target="_blank">http://localhost:9090</a> and you should see a test_total metric.
	</p>
	<p>
	FYI: Each request will increment test_total by 1.
	</p>
</body>
</html>
"#;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    metrics: RequestMetrics,
    propagator: Arc<TextMapCompositePropagator>,
}

impl AppState {
    pub fn new(metrics: RequestMetrics, propagator: Arc<TextMapCompositePropagator>) -> Self {
        Self {
            metrics,
            propagator,
        }
    }
}

/// Read-only view of request headers for context extraction.
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle GET / - count the request and serve the landing page.
async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let cx = state.propagator.extract(&HeaderExtractor(&headers));
    state.metrics.record_request(&cx);

    ([(header::CONTENT_TYPE, "text/html")], INDEX_HTML)
}

/// Run the HTTP server until the shutdown signal fires.
///
/// # Arguments
///
/// * `addr` - Address to bind to
/// * `state` - Handler state
/// * `shutdown_rx` - Receiver for shutdown signal
pub async fn run_server(
    addr: SocketAddr,
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("Shutdown signal received, stopping server");
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
