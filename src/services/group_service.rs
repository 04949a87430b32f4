use std::sync::Arc;
use tracing::{info, instrument};

use super::Caller;
use crate::models::{
    group_name_from_path, validate_username, AddGroupMemberRequest, Group, ServiceError,
    ServiceResult, User,
};
use crate::repositories::UserRepository;

/// Service for managing group membership
pub struct GroupService {
    user_repository: Arc<dyn UserRepository>,
}

impl GroupService {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }

    async fn resolve_group(&self, group_slug: &str) -> ServiceResult<Group> {
        let name = group_name_from_path(group_slug);
        self.user_repository
            .find_group(&name)
            .await?
            .ok_or(ServiceError::GroupNotFound { name })
    }

    /// Members of a group, ordered by username
    #[instrument(skip(self, caller), fields(user = %caller.username(), group = %group_slug))]
    pub async fn list_members(&self, caller: &Caller, group_slug: &str) -> ServiceResult<Vec<User>> {
        caller.require_catalog_admin()?;
        let group = self.resolve_group(group_slug).await?;

        let mut members = self.user_repository.list_group_members(&group.name).await?;
        members.sort_by(|a, b| a.username.cmp(&b.username));

        info!("Group has {} members", members.len());
        Ok(members)
    }

    #[instrument(skip(self, caller, request), fields(user = %caller.username(), group = %group_slug))]
    pub async fn add_member(
        &self,
        caller: &Caller,
        group_slug: &str,
        request: AddGroupMemberRequest,
    ) -> ServiceResult<User> {
        caller.require_catalog_admin()?;
        let group = self.resolve_group(group_slug).await?;
        let username = validate_username(request.username.as_deref())?;

        let user = self
            .user_repository
            .find_by_username(&username)
            .await?
            .ok_or(ServiceError::UserNotFound {
                identifier: username,
            })?;

        let user = self.user_repository.add_to_group(&user.id, &group.name).await?;
        crate::info_with_trace!(member = %user.username, group = %group.name, "User added to group");
        Ok(user)
    }

    #[instrument(skip(self, caller), fields(user = %caller.username(), group = %group_slug, member_id = %user_id))]
    pub async fn remove_member(
        &self,
        caller: &Caller,
        group_slug: &str,
        user_id: &str,
    ) -> ServiceResult<User> {
        caller.require_catalog_admin()?;
        let group = self.resolve_group(group_slug).await?;

        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::UserNotFound {
                identifier: user_id.to_string(),
            })?;

        let user = self
            .user_repository
            .remove_from_group(&user.id, &group.name)
            .await?;
        crate::info_with_trace!(member = %user.username, group = %group.name, "User removed from group");
        Ok(user)
    }
}
