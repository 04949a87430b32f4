use axum::response::Json;
use serde_json::{json, Value};
use tracing::instrument;

/// Liveness check; does not touch the store
#[instrument(name = "health_check")]
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
