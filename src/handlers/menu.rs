use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
};
use tracing::{info, instrument};

use super::api::{error_response, json_body, service_error_to_response, ApiError, ApiState};
use crate::models::{
    Category, CreateCategoryRequest, CreateMenuItemRequest, MenuItemFilters, MenuItemResponse,
    UpdateCategoryRequest, UpdateMenuItemRequest,
};
use crate::services::Caller;

// =============================================================================
// CATEGORIES
// =============================================================================

#[instrument(name = "list_categories", skip_all)]
pub async fn list_categories(
    State(state): State<ApiState>,
    _caller: Caller,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = state
        .menu_service
        .list_categories()
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(categories))
}

#[instrument(name = "create_category", skip_all, fields(user = %caller.username()))]
pub async fn create_category(
    State(state): State<ApiState>,
    caller: Caller,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let request = json_body(payload)?;

    let category = state
        .menu_service
        .create_category(&caller, request)
        .await
        .map_err(service_error_to_response)?;

    crate::info_with_trace!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(name = "get_category", skip(state, _caller))]
pub async fn get_category(
    State(state): State<ApiState>,
    _caller: Caller,
    Path(category_id): Path<String>,
) -> Result<Json<Category>, ApiError> {
    state
        .menu_service
        .get_category(&category_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// PUT: every field must be supplied
#[instrument(name = "replace_category", skip(state, caller, payload), fields(user = %caller.username()))]
pub async fn replace_category(
    State(state): State<ApiState>,
    caller: Caller,
    Path(category_id): Path<String>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<Json<Category>, ApiError> {
    let request = json_body(payload)?;

    state
        .menu_service
        .update_category(&caller, &category_id, request.into())
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "update_category", skip(state, caller, payload), fields(user = %caller.username()))]
pub async fn update_category(
    State(state): State<ApiState>,
    caller: Caller,
    Path(category_id): Path<String>,
    payload: Result<Json<UpdateCategoryRequest>, JsonRejection>,
) -> Result<Json<Category>, ApiError> {
    let request = json_body(payload)?;

    state
        .menu_service
        .update_category(&caller, &category_id, request)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "delete_category", skip(state, caller), fields(user = %caller.username()))]
pub async fn delete_category(
    State(state): State<ApiState>,
    caller: Caller,
    Path(category_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .menu_service
        .delete_category(&caller, &category_id)
        .await
        .map_err(service_error_to_response)?;

    info!("Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// MENU ITEMS
// =============================================================================

/// `?category=<id>&featured=<bool>&search=<text>&ordering=[-]price|[-]title`
#[instrument(name = "list_menu_items", skip_all)]
pub async fn list_menu_items(
    State(state): State<ApiState>,
    _caller: Caller,
    query: Result<Query<MenuItemFilters>, QueryRejection>,
) -> Result<Json<Vec<MenuItemResponse>>, ApiError> {
    let Query(filters) =
        query.map_err(|rejection| error_response(StatusCode::BAD_REQUEST, rejection.body_text()))?;

    let items = state
        .menu_service
        .list_menu_items(filters)
        .await
        .map_err(service_error_to_response)?;

    info!("Listed {} menu items", items.len());
    Ok(Json(items))
}

#[instrument(name = "create_menu_item", skip_all, fields(user = %caller.username()))]
pub async fn create_menu_item(
    State(state): State<ApiState>,
    caller: Caller,
    payload: Result<Json<CreateMenuItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MenuItemResponse>), ApiError> {
    let request = json_body(payload)?;

    let item = state
        .menu_service
        .create_menu_item(&caller, request)
        .await
        .map_err(service_error_to_response)?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(name = "get_menu_item", skip(state, _caller))]
pub async fn get_menu_item(
    State(state): State<ApiState>,
    _caller: Caller,
    Path(menu_item_id): Path<String>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    state
        .menu_service
        .get_menu_item(&menu_item_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "replace_menu_item", skip(state, caller, payload), fields(user = %caller.username()))]
pub async fn replace_menu_item(
    State(state): State<ApiState>,
    caller: Caller,
    Path(menu_item_id): Path<String>,
    payload: Result<Json<CreateMenuItemRequest>, JsonRejection>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let request = json_body(payload)?;

    state
        .menu_service
        .update_menu_item(&caller, &menu_item_id, request.into())
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "update_menu_item", skip(state, caller, payload), fields(user = %caller.username()))]
pub async fn update_menu_item(
    State(state): State<ApiState>,
    caller: Caller,
    Path(menu_item_id): Path<String>,
    payload: Result<Json<UpdateMenuItemRequest>, JsonRejection>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let request = json_body(payload)?;

    state
        .menu_service
        .update_menu_item(&caller, &menu_item_id, request)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "delete_menu_item", skip(state, caller), fields(user = %caller.username()))]
pub async fn delete_menu_item(
    State(state): State<ApiState>,
    caller: Caller,
    Path(menu_item_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .menu_service
        .delete_menu_item(&caller, &menu_item_id)
        .await
        .map_err(service_error_to_response)?;

    info!("Menu item deleted");
    Ok(StatusCode::NO_CONTENT)
}
