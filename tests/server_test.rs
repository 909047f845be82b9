//! HTTP server integration tests against a bootstrapped pipeline.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{telemetry_config, RecordingGlobals};
use http_body_util::BodyExt;
use otelboot::observability::instruments::{InstrumentRegistry, RequestMetrics};
use otelboot::server::{create_router, run_server, AppState};
use otelboot::setup_telemetry;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

#[tokio::test]
async fn test_index_counts_and_serves_page() {
    let globals = RecordingGlobals::new();
    let mut telemetry = setup_telemetry(
        &telemetry_config(Some("console"), None),
        &globals,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let mut registry = InstrumentRegistry::new(telemetry.meter("otelboot"));
    let metrics = RequestMetrics::register(&mut registry).unwrap();
    let app = create_router(AppState::new(metrics, telemetry.propagator().clone()));

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(
                        "traceparent",
                        "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("test_total"));
    }

    telemetry.shutdown(None).await.unwrap();
}

#[tokio::test]
async fn test_server_stops_on_signal() {
    let globals = RecordingGlobals::new();
    let mut telemetry = setup_telemetry(
        &telemetry_config(None, None),
        &globals,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let mut registry = InstrumentRegistry::new(telemetry.meter("otelboot"));
    let metrics = RequestMetrics::register(&mut registry).unwrap();
    let state = AppState::new(metrics, telemetry.propagator().clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(run_server(
        "127.0.0.1:0".parse().unwrap(),
        state,
        shutdown_rx,
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop within timeout")
        .unwrap();
    assert!(result.is_ok());

    telemetry.shutdown(None).await.unwrap();
}
