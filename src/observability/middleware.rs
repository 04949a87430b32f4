use axum::{
    extract::{MatchedPath, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::{Status, TraceContextExt};
use std::{sync::Arc, time::Instant};
use tracing::{error, info, instrument, warn, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Metrics;
use crate::models::Role;

/// Header carrying the username established by the upstream authenticator
pub const AUTHENTICATED_USER_HEADER: &str = "x-authenticated-user";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// First address of `X-Forwarded-For`, then `X-Real-IP`
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .or_else(|| header_value(headers, "x-real-ip"))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Request span, HTTP metrics and one completion log line per request
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let headers = request.headers();

    let user_agent = header_value(headers, "user-agent")
        .unwrap_or("unknown")
        .to_string();
    let client_ip = client_ip(headers).unwrap_or_else(|| "unknown".to_string());
    let caller = header_value(headers, AUTHENTICATED_USER_HEADER)
        .unwrap_or("anonymous")
        .to_string();

    // Group metrics by route template so ids do not explode label cardinality
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let span_name = format!("{} {}", method, endpoint);
    let span = tracing::info_span!(
        target: "littlelemon_rs::http",
        "{}", span_name,
        otel.name = %span_name,
        otel.kind = "server",
        http.method = %method,
        http.route = %endpoint,
        http.url = %uri,
        http.user_agent = %user_agent,
        client.address = %client_ip,
        enduser.id = %caller,
        http.response.status_code = tracing::field::Empty,
        http.response_time_ms = tracing::field::Empty,
    );

    async {
        metrics.increment_in_flight(&method, &endpoint);

        let trace_id = tracing::Span::current()
            .context()
            .span()
            .span_context()
            .trace_id()
            .to_string();

        info!(trace_id = %trace_id, method = %method, path = %endpoint, caller = %caller, client_ip = %client_ip, "Processing request");

        let response = next.run(request).await;

        let duration = start_time.elapsed();
        let duration_ms = duration.as_millis();
        let status_code = response.status().as_u16();

        let current_span = tracing::Span::current();
        current_span.record("http.response.status_code", status_code);
        current_span.record("http.response_time_ms", duration_ms);

        // Only server faults mark the span as failed
        if status_code >= 500 {
            current_span
                .context()
                .span()
                .set_status(Status::error("HTTP server error"));
        } else {
            current_span.context().span().set_status(Status::Ok);
        }

        metrics.record_http_request(&method, &endpoint, status_code, duration.as_secs_f64());
        metrics.decrement_in_flight(&method, &endpoint);

        if status_code >= 500 {
            error!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                caller = %caller,
                "Request failed"
            );
        } else if status_code >= 400 {
            warn!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                caller = %caller,
                "Request rejected"
            );
        } else {
            info!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                caller = %caller,
                "Request completed"
            );
        }

        response
    }
    .instrument(span)
    .await
}

/// Wraps storage operations that happen outside the repositories, such as table
/// provisioning and seeding
pub struct DatabaseTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl DatabaseTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Trace a database operation with automatic metrics recording
    #[instrument(skip_all, fields(
        operation = %operation,
        table = %table,
    ))]
    pub async fn trace_operation<F, T, E>(
        &self,
        operation: &str,
        table: &str,
        future: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();

        info!("Starting database operation");

        match future.await {
            Ok(result) => {
                let duration_seconds = start_time.elapsed().as_secs_f64();
                self.metrics
                    .record_database_operation(operation, table, true, duration_seconds);

                info!(
                    duration_ms = start_time.elapsed().as_millis(),
                    "Database operation completed successfully"
                );

                Ok(result)
            }
            Err(error) => {
                let duration_seconds = start_time.elapsed().as_secs_f64();
                self.metrics
                    .record_database_operation(operation, table, false, duration_seconds);

                error!(
                    error = %error,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Database operation failed"
                );

                Err(error)
            }
        }
    }
}

/// Records business metrics around cart and order operations
pub struct BusinessTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl BusinessTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    #[instrument(skip_all, fields(
        operation = %operation,
        user_id = %user_id,
    ))]
    pub async fn trace_cart_operation<F, T, E>(
        &self,
        operation: &str,
        user_id: &str,
        future: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();

        info!("Starting cart operation");

        match future.await {
            Ok(result) => {
                self.metrics.record_cart_operation(operation, true);

                info!(
                    duration_ms = start_time.elapsed().as_millis(),
                    "Cart operation completed successfully"
                );

                Ok(result)
            }
            Err(error) => {
                self.metrics.record_cart_operation(operation, false);

                warn!(
                    error = %error,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Cart operation failed"
                );

                Err(error)
            }
        }
    }

    /// Trace an order operation, labelled with the caller's role
    #[instrument(skip_all, fields(
        operation = %operation,
        role = %role,
    ))]
    pub async fn trace_order_operation<F, T, E>(
        &self,
        operation: &str,
        role: Role,
        future: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();
        let role_label = role.to_string();

        info!("Starting order operation");

        match future.await {
            Ok(result) => {
                self.metrics
                    .record_order_operation(operation, &role_label, true);

                info!(
                    duration_ms = start_time.elapsed().as_millis(),
                    "Order operation completed successfully"
                );

                Ok(result)
            }
            Err(error) => {
                self.metrics
                    .record_order_operation(operation, &role_label, false);

                warn!(
                    error = %error,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Order operation failed"
                );

                Err(error)
            }
        }
    }
}
