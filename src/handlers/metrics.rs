use axum::{extract::State, http::header, http::StatusCode, response::IntoResponse};
use prometheus::TEXT_FORMAT;
use std::sync::Arc;
use tracing::{debug, error, instrument};

use super::api::{error_response, ApiError};
use crate::observability::Metrics;

/// `GET /metrics`: every registered series in the Prometheus text exposition format.
/// Not throttled and needs no identity header.
#[instrument(name = "metrics_scrape", skip(metrics))]
pub async fn metrics_handler(
    State(metrics): State<Arc<Metrics>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = scrape(&metrics)?;
    debug!(bytes = body.len(), "Metrics scraped");
    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body))
}

fn scrape(metrics: &Metrics) -> Result<String, ApiError> {
    metrics.encode().map_err(|e| {
        error!(error = %e, "Metrics scrape failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
    })
}
