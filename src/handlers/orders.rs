use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use tracing::instrument;

use super::api::{json_body, service_error_to_response, ApiError, ApiState};
use crate::models::{DeletedOrderResponse, Order, OrderItem, OrderPatch};
use crate::services::access_policy::NO_CUSTOMER_ACCESS;
use crate::services::Caller;

/// Order items visible to the caller's role
#[instrument(name = "list_orders", skip_all, fields(user = %caller.username(), role = %caller.role))]
pub async fn list_orders(
    State(state): State<ApiState>,
    caller: Caller,
) -> Result<Json<Vec<OrderItem>>, ApiError> {
    state
        .business
        .trace_order_operation("list", caller.role, state.order_service.list_orders(&caller))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// Convert the caller's cart into an order
#[instrument(name = "create_order", skip_all, fields(user = %caller.username()))]
pub async fn create_order(
    State(state): State<ApiState>,
    caller: Caller,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .business
        .trace_order_operation("create", caller.role, state.order_service.create_order(&caller))
        .await
        .map_err(service_error_to_response)?;

    crate::info_with_trace!(order_id = %order.id, total = %order.total, "Order placed");
    Ok(Json(order))
}

#[instrument(name = "retrieve_order", skip(state, caller), fields(user = %caller.username()))]
pub async fn retrieve_order(
    State(state): State<ApiState>,
    caller: Caller,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<OrderItem>>, ApiError> {
    state
        .business
        .trace_order_operation(
            "retrieve",
            caller.role,
            state.order_service.retrieve_order(&caller, &order_id),
        )
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// PUT and PATCH both apply a partial patch; what may change depends on the role
#[instrument(name = "update_order", skip(state, caller, payload), fields(user = %caller.username(), role = %caller.role))]
pub async fn update_order(
    State(state): State<ApiState>,
    caller: Caller,
    Path(order_id): Path<String>,
    payload: Result<Json<OrderPatch>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    // Role gate precedes body parsing
    caller
        .reject_customer(NO_CUSTOMER_ACCESS)
        .map_err(service_error_to_response)?;
    let patch = json_body(payload)?;

    state
        .business
        .trace_order_operation(
            "update",
            caller.role,
            state.order_service.update_order(&caller, &order_id, patch),
        )
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "delete_order", skip(state, caller), fields(user = %caller.username()))]
pub async fn delete_order(
    State(state): State<ApiState>,
    caller: Caller,
    Path(order_id): Path<String>,
) -> Result<Json<DeletedOrderResponse>, ApiError> {
    state
        .business
        .trace_order_operation(
            "delete",
            caller.role,
            state.order_service.delete_order(&caller, &order_id),
        )
        .await
        .map(Json)
        .map_err(service_error_to_response)
}
