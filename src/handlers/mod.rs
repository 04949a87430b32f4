pub mod admin;
pub mod api;
pub mod cart;
pub mod groups;
pub mod health;
pub mod identity;
pub mod menu;
pub mod metrics;
pub mod middleware;
pub mod orders;

#[cfg(test)]
mod test_support;

pub use admin::{create_admin_router, seed_demo_data, AdminState, SeedSummary};
pub use api::{create_api_router, service_error_to_response, ApiError, ApiState};
pub use health::health_check;
pub use metrics::metrics_handler;
pub use middleware::{
    cors_layer, rate_limiting_middleware, request_validation_middleware,
    security_headers_middleware, RateLimiter,
};
