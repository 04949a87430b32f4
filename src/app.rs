use aws_sdk_dynamodb::Client as DynamoDbClient;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;

use crate::config::{Config, DatabaseConfig};
use crate::handlers::{
    cors_layer, create_admin_router, create_api_router, health_check, metrics_handler,
    rate_limiting_middleware, request_validation_middleware, security_headers_middleware,
    AdminState, ApiState, RateLimiter,
};
use crate::observability::{observability_middleware, DatabaseTracingMiddleware, Metrics};
use crate::repositories::{
    dynamodb::DynamoDbTelemetry, CartRepository, DynamoDbCartRepository, DynamoDbMenuRepository,
    DynamoDbOrderRepository, DynamoDbUserRepository, InMemoryStore, MenuRepository, OrderRepository, TableManager,
    UserRepository,
};
use crate::services::{CartService, GroupService, MenuService, OrderService};

/// One handle per repository trait, backed by a single storage backend
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub menu: Arc<dyn MenuRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
    /// Only the DynamoDB backend can provision tables
    pub table_manager: Option<Arc<TableManager>>,
}

impl Repositories {
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            menu: store.clone(),
            carts: store.clone(),
            orders: store,
            table_manager: None,
        }
    }

    /// DynamoDB repositories sharing one client; every call is recorded in `metrics`
    pub fn dynamodb(
        client: Arc<DynamoDbClient>,
        config: &DatabaseConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let telemetry = DynamoDbTelemetry::new(metrics, config.region.clone());
        Self {
            users: Arc::new(DynamoDbUserRepository::new(
                client.clone(),
                config.users_table.clone(),
                config.groups_table.clone(),
                telemetry.clone(),
            )),
            menu: Arc::new(DynamoDbMenuRepository::new(
                client.clone(),
                config.categories_table.clone(),
                config.menu_items_table.clone(),
                telemetry.clone(),
            )),
            carts: Arc::new(DynamoDbCartRepository::new(
                client.clone(),
                config.carts_table.clone(),
                telemetry.clone(),
            )),
            orders: Arc::new(DynamoDbOrderRepository::new(
                client.clone(),
                config.orders_table.clone(),
                config.order_items_table.clone(),
                config.carts_table.clone(),
                telemetry,
            )),
            table_manager: Some(Arc::new(TableManager::new(client))),
        }
    }
}

/// Build the full application router.
///
/// Layers, outermost first: observability, security headers, CORS, request
/// timeout, body validation. Throttling wraps only the `/api` resources.
pub fn create_app(config: &Config, repositories: Repositories, metrics: Arc<Metrics>) -> Router {
    let menu_service = Arc::new(MenuService::new(repositories.menu.clone()));
    let group_service = Arc::new(GroupService::new(repositories.users.clone()));
    let cart_service = Arc::new(CartService::new(
        repositories.carts.clone(),
        repositories.menu.clone(),
    ));
    let order_service = Arc::new(OrderService::new(
        repositories.orders.clone(),
        repositories.carts.clone(),
        repositories.users.clone(),
    ));

    let api_state = ApiState::new(
        menu_service,
        group_service,
        cart_service,
        order_service,
        repositories.users.clone(),
        metrics.clone(),
    );
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.clone(),
        metrics.clone(),
    ));

    let mut app = Router::new()
        .route("/health/status", get(health_check))
        .merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics.clone()),
        )
        .merge(
            create_api_router(api_state)
                .layer(middleware::from_fn_with_state(limiter, rate_limiting_middleware)),
        );

    if config.server.enable_admin_endpoints {
        app = app.merge(create_admin_router(AdminState {
            table_manager: repositories.table_manager.clone(),
            database: config.database.clone(),
            user_repository: repositories.users.clone(),
            menu_repository: repositories.menu.clone(),
            database_tracing: Arc::new(DatabaseTracingMiddleware::new(metrics.clone())),
        }));
    }

    app.layer(middleware::from_fn_with_state(
        config.server.max_request_size,
        request_validation_middleware,
    ))
    .layer(TimeoutLayer::new(config.server.request_timeout()))
    .layer(cors_layer())
    .layer(middleware::from_fn(security_headers_middleware))
    .layer(middleware::from_fn(move |req, next| {
        observability_middleware(metrics.clone(), req, next)
    }))
}
