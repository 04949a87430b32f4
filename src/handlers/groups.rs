use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{info, instrument};

use super::api::{json_body, service_error_to_response, ApiError, ApiState};
use crate::models::{AddGroupMemberRequest, UserResponse};
use crate::services::Caller;

/// Members of `/api/groups/{group}/users`; `delivery-crew` names the "delivery crew" group
#[instrument(name = "list_group_members", skip(state, caller), fields(user = %caller.username()))]
pub async fn list_members(
    State(state): State<ApiState>,
    caller: Caller,
    Path(group): Path<String>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let members = state
        .group_service
        .list_members(&caller, &group)
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(members.iter().map(|user| user.to_response()).collect()))
}

#[instrument(name = "add_group_member", skip(state, caller, payload), fields(user = %caller.username()))]
pub async fn add_member(
    State(state): State<ApiState>,
    caller: Caller,
    Path(group): Path<String>,
    payload: Result<Json<AddGroupMemberRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let request = json_body(payload)?;

    let member = state
        .group_service
        .add_member(&caller, &group, request)
        .await
        .map_err(service_error_to_response)?;

    Ok((StatusCode::CREATED, Json(member.to_response())))
}

#[instrument(name = "remove_group_member", skip(state, caller), fields(user = %caller.username()))]
pub async fn remove_member(
    State(state): State<ApiState>,
    caller: Caller,
    Path((group, user_id)): Path<(String, String)>,
) -> Result<Json<UserResponse>, ApiError> {
    let member = state
        .group_service
        .remove_member(&caller, &group, &user_id)
        .await
        .map_err(service_error_to_response)?;

    info!(member = %member.username, "Removed from group");
    Ok(Json(member.to_response()))
}
