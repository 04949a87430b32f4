use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),
    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

/// Prometheus metrics for the ordering service
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // HTTP metrics
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub http_requests_in_flight: GaugeVec,
    pub http_requests_throttled_total: CounterVec,

    // Database metrics
    pub database_operations_total: CounterVec,
    pub database_operation_duration_seconds: HistogramVec,

    // Business metrics
    pub cart_operations_total: CounterVec,
    pub order_operations_total: CounterVec,
}

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

impl Metrics {
    /// Create a new metrics instance with every metric registered
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        info!("Initializing Prometheus metrics");

        let http_requests_total = CounterVec::new(
            Opts::new(
                "http_requests_total",
                "Total number of HTTP requests processed",
            ),
            &["method", "endpoint", "status_code"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "endpoint"],
        )?;

        let http_requests_in_flight = GaugeVec::new(
            Opts::new(
                "http_requests_in_flight",
                "Number of HTTP requests currently being processed",
            ),
            &["method", "endpoint"],
        )?;

        let http_requests_throttled_total = CounterVec::new(
            Opts::new(
                "http_requests_throttled_total",
                "Total number of requests rejected by the rate limiter",
            ),
            &["client_kind"],
        )?;

        let database_operations_total = CounterVec::new(
            Opts::new(
                "database_operations_total",
                "Total number of database operations",
            ),
            &["operation", "table", "status"],
        )?;

        let database_operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "database_operation_duration_seconds",
                "Database operation duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["operation", "table"],
        )?;

        let cart_operations_total = CounterVec::new(
            Opts::new("cart_operations_total", "Total number of cart operations"),
            &["operation", "status"],
        )?;

        let order_operations_total = CounterVec::new(
            Opts::new(
                "order_operations_total",
                "Total number of order operations by caller role",
            ),
            &["operation", "role", "status"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_requests_throttled_total.clone()))?;
        registry.register(Box::new(database_operations_total.clone()))?;
        registry.register(Box::new(database_operation_duration_seconds.clone()))?;
        registry.register(Box::new(cart_operations_total.clone()))?;
        registry.register(Box::new(order_operations_total.clone()))?;

        info!("Prometheus metrics initialized successfully");

        Ok(Metrics {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            http_requests_throttled_total,
            database_operations_total,
            database_operation_duration_seconds,
            cart_operations_total,
            order_operations_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }

    pub fn record_http_request(
        &self,
        method: &str,
        endpoint: &str,
        status_code: u16,
        duration_seconds: f64,
    ) {
        let status_str = status_code.to_string();

        self.http_requests_total
            .with_label_values(&[method, endpoint, &status_str])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration_seconds);
    }

    /// `client_kind` is `user` when throttled on the identity header, `ip` otherwise
    pub fn record_throttled_request(&self, client_kind: &str) {
        self.http_requests_throttled_total
            .with_label_values(&[client_kind])
            .inc();
    }

    pub fn record_database_operation(
        &self,
        operation: &str,
        table: &str,
        success: bool,
        duration_seconds: f64,
    ) {
        self.database_operations_total
            .with_label_values(&[operation, table, status_label(success)])
            .inc();

        self.database_operation_duration_seconds
            .with_label_values(&[operation, table])
            .observe(duration_seconds);
    }

    pub fn record_cart_operation(&self, operation: &str, success: bool) {
        self.cart_operations_total
            .with_label_values(&[operation, status_label(success)])
            .inc();
    }

    pub fn record_order_operation(&self, operation: &str, role: &str, success: bool) {
        self.order_operations_total
            .with_label_values(&[operation, role, status_label(success)])
            .inc();
    }

    pub fn increment_in_flight(&self, method: &str, endpoint: &str) {
        self.http_requests_in_flight
            .with_label_values(&[method, endpoint])
            .inc();
    }

    pub fn decrement_in_flight(&self, method: &str, endpoint: &str) {
        self.http_requests_in_flight
            .with_label_values(&[method, endpoint])
            .dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_http_request_recording() {
        let metrics = Metrics::new().unwrap();

        metrics.record_http_request("GET", "/api/menu-items", 200, 0.123);
        metrics.record_http_request("POST", "/api/orders", 201, 0.456);

        let metrics_text = metrics.encode().unwrap();
        assert!(metrics_text.contains("http_requests_total"));
        assert!(metrics_text.contains("http_request_duration_seconds"));
        assert!(metrics_text.contains("endpoint=\"/api/orders\""));
    }

    #[test]
    fn test_database_operation_recording() {
        let metrics = Metrics::new().unwrap();

        metrics.record_database_operation("create_table", "LittleLemonOrders", true, 0.050);
        metrics.record_database_operation("seed", "LittleLemonMenuItems", false, 0.100);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("database_operations_total"));
        assert!(encoded.contains("database_operation_duration_seconds"));
        assert!(encoded.contains("status=\"error\""));
    }

    #[test]
    fn test_business_metrics_recording() {
        let metrics = Metrics::new().unwrap();

        metrics.record_cart_operation("add_item", true);
        metrics.record_order_operation("create", "customer", true);
        metrics.record_order_operation("update", "delivery_crew", false);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("cart_operations_total"));
        assert!(encoded.contains("order_operations_total"));
        assert!(encoded.contains("role=\"delivery_crew\""));
    }

    #[test]
    fn test_throttled_and_in_flight_requests() {
        let metrics = Metrics::new().unwrap();

        metrics.increment_in_flight("GET", "/api/cart/menu-items");
        metrics.increment_in_flight("GET", "/api/cart/menu-items");
        metrics.decrement_in_flight("GET", "/api/cart/menu-items");
        metrics.record_throttled_request("user");

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("http_requests_in_flight"));
        assert!(encoded.contains("http_requests_throttled_total"));
    }
}
