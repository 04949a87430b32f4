use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use tracing::instrument;

use super::api::{json_body, service_error_to_response, ApiError, ApiState};
use crate::models::{AddCartItemRequest, CartEntry, ClearCartResponse};
use crate::services::Caller;

/// Entries in the caller's cart
#[instrument(name = "list_cart", skip_all, fields(user = %caller.username()))]
pub async fn list_cart(
    State(state): State<ApiState>,
    caller: Caller,
) -> Result<Json<Vec<CartEntry>>, ApiError> {
    state
        .business
        .trace_cart_operation("list", caller.user_id(), state.cart_service.list_cart(&caller))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// Add `{"menuitem": <id>, "quantity": <n>}` to the caller's cart
#[instrument(name = "add_to_cart", skip_all, fields(user = %caller.username()))]
pub async fn add_to_cart(
    State(state): State<ApiState>,
    caller: Caller,
    payload: Result<Json<AddCartItemRequest>, JsonRejection>,
) -> Result<Json<CartEntry>, ApiError> {
    let request = json_body(payload)?;

    state
        .business
        .trace_cart_operation(
            "add_item",
            caller.user_id(),
            state.cart_service.add_to_cart(&caller, request),
        )
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "clear_cart", skip_all, fields(user = %caller.username()))]
pub async fn clear_cart(
    State(state): State<ApiState>,
    caller: Caller,
) -> Result<Json<ClearCartResponse>, ApiError> {
    let deleted = state
        .business
        .trace_cart_operation("clear", caller.user_id(), state.cart_service.clear_cart(&caller))
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(ClearCartResponse { deleted }))
}
