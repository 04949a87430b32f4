use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::Json,
    routing::{delete, get},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use super::{cart, groups, menu, orders};
use crate::models::{RepositoryError, ServiceError};
use crate::observability::{BusinessTracingMiddleware, Metrics};
use crate::repositories::UserRepository;
use crate::services::{CartService, GroupService, MenuService, OrderService};

/// Status code and `{"message", "timestamp"}` body returned on failure
pub type ApiError = (StatusCode, Json<Value>);

/// Shared state for the `/api` resources
#[derive(Clone)]
pub struct ApiState {
    pub menu_service: Arc<MenuService>,
    pub group_service: Arc<GroupService>,
    pub cart_service: Arc<CartService>,
    pub order_service: Arc<OrderService>,
    /// Resolves the forwarded username into a caller
    pub user_repository: Arc<dyn UserRepository>,
    pub business: Arc<BusinessTracingMiddleware>,
}

impl ApiState {
    pub fn new(
        menu_service: Arc<MenuService>,
        group_service: Arc<GroupService>,
        cart_service: Arc<CartService>,
        order_service: Arc<OrderService>,
        user_repository: Arc<dyn UserRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            menu_service,
            group_service,
            cart_service,
            order_service,
            user_repository,
            business: Arc::new(BusinessTracingMiddleware::new(metrics)),
        }
    }
}

/// Router with every `/api` resource except the admin endpoints
pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        // Catalog
        .route(
            "/api/categories",
            get(menu::list_categories).post(menu::create_category),
        )
        .route(
            "/api/categories/:category_id",
            get(menu::get_category)
                .put(menu::replace_category)
                .patch(menu::update_category)
                .delete(menu::delete_category),
        )
        .route(
            "/api/menu-items",
            get(menu::list_menu_items).post(menu::create_menu_item),
        )
        .route(
            "/api/menu-items/:menu_item_id",
            get(menu::get_menu_item)
                .put(menu::replace_menu_item)
                .patch(menu::update_menu_item)
                .delete(menu::delete_menu_item),
        )
        // Group membership
        .route(
            "/api/groups/:group/users",
            get(groups::list_members).post(groups::add_member),
        )
        .route(
            "/api/groups/:group/users/:user_id",
            delete(groups::remove_member),
        )
        // Cart and orders
        .route(
            "/api/cart/menu-items",
            get(cart::list_cart)
                .post(cart::add_to_cart)
                .delete(cart::clear_cart),
        )
        .route(
            "/api/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route(
            "/api/orders/:order_id",
            get(orders::retrieve_order)
                .put(orders::update_order)
                .patch(orders::update_order)
                .delete(orders::delete_order),
        )
        .with_state(state)
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({
            "message": message.into(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// Unwrap a JSON body, reporting malformed payloads as validation failures
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected request body");
            let status = match &rejection {
                JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                _ => StatusCode::BAD_REQUEST,
            };
            Err(error_response(status, rejection.body_text()))
        }
    }
}

/// Map a service failure onto the HTTP status it stands for
pub fn service_error_to_response(err: ServiceError) -> ApiError {
    let (status, message) = match &err {
        ServiceError::Forbidden { message } => (StatusCode::FORBIDDEN, message.clone()),
        ServiceError::ValidationError { message } => (StatusCode::BAD_REQUEST, message.clone()),
        ServiceError::CategoryNotFound { .. }
        | ServiceError::MenuItemNotFound { .. }
        | ServiceError::OrderNotFound { .. }
        | ServiceError::UserNotFound { .. }
        | ServiceError::GroupNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::Repository { source } => match source {
            RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found.".to_string()),
            RepositoryError::TransactionFailed { .. } => (
                StatusCode::CONFLICT,
                "The request conflicted with a concurrent change; nothing was written".to_string(),
            ),
            RepositoryError::ConstraintViolation { message } => {
                (StatusCode::CONFLICT, message.clone())
            }
            RepositoryError::ConnectionFailed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Database connection failed".to_string(),
            ),
            RepositoryError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "Database operation timed out".to_string(),
            ),
            RepositoryError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        },
        ServiceError::Configuration { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Configuration error".to_string(),
        ),
    };

    if status.is_server_error() {
        crate::error_with_trace!(error = %err, status = status.as_u16(), "Request failed");
    } else {
        crate::warn_with_trace!(error = %err, status = status.as_u16(), "Request rejected");
    }

    error_response(status, message)
}
