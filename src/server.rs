use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use http::{header, StatusCode};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::metrics::MetricSink;

pub fn router(sink: Arc<MetricSink>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(sink)
}

async fn metrics_handler(State(sink): State<Arc<MetricSink>>) -> Response {
    match sink.render().await {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

/// Serve `/metrics` on `addr` until `cancel` fires.
pub async fn serve(addr: &str, sink: Arc<MetricSink>, cancel: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    serve_on(listener, sink, cancel).await
}

pub async fn serve_on(listener: TcpListener, sink: Arc<MetricSink>, cancel: CancellationToken) -> Result<()> {
    info!("serving metrics on {}", listener.local_addr()?);
    axum::serve(listener, router(sink))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("server error")
}
