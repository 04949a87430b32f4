use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use tracing::debug;

use super::api::{error_response, service_error_to_response, ApiError, ApiState};
use crate::observability::AUTHENTICATED_USER_HEADER;
use crate::services::Caller;

/// Resolves `X-Authenticated-User` into the caller of the request.
///
/// A missing header, an unknown username or an inactive account is rejected
/// with 401 before any handler runs.
#[async_trait]
impl FromRequestParts<ApiState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(AUTHENTICATED_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "Authentication credentials were not provided.",
                )
            })?;

        let user = state
            .user_repository
            .find_by_username(username)
            .await
            .map_err(|e| service_error_to_response(e.into()))?;

        match user {
            Some(user) if user.is_active => {
                let caller = Caller::new(user);
                debug!(username = %caller.username(), role = %caller.role, "Resolved caller");
                Ok(caller)
            }
            Some(_) => Err(error_response(
                StatusCode::UNAUTHORIZED,
                "User inactive or deleted.",
            )),
            None => Err(error_response(
                StatusCode::UNAUTHORIZED,
                "Invalid user.",
            )),
        }
    }
}
