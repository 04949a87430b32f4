use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use super::dynamodb::{
    get_bool, get_string, get_string_set, map_dynamodb_error, parse_items, string_attribute,
    DynamoDbTelemetry, Item,
};
use crate::models::{Group, RepositoryError, RepositoryResult, User};

/// Data access for users and group membership
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;

    async fn list_group_members(&self, group_name: &str) -> RepositoryResult<Vec<User>>;

    async fn find_group(&self, name: &str) -> RepositoryResult<Option<Group>>;

    /// Add a user to a group and return the updated user
    async fn add_to_group(&self, user_id: &str, group_name: &str) -> RepositoryResult<User>;

    /// Remove a user from a group and return the updated user
    async fn remove_from_group(&self, user_id: &str, group_name: &str) -> RepositoryResult<User>;

    /// Create or replace a user record
    async fn save_user(&self, user: User) -> RepositoryResult<User>;

    /// Create or replace a group record
    async fn save_group(&self, group: Group) -> RepositoryResult<Group>;
}

/// DynamoDB implementation of the UserRepository trait
pub struct DynamoDbUserRepository {
    client: Arc<DynamoDbClient>,
    users_table: String,
    groups_table: String,
    telemetry: DynamoDbTelemetry,
}

impl DynamoDbUserRepository {
    pub fn new(
        client: Arc<DynamoDbClient>,
        users_table: String,
        groups_table: String,
        telemetry: DynamoDbTelemetry,
    ) -> Self {
        Self {
            client,
            users_table,
            groups_table,
            telemetry,
        }
    }

    /// Name of the username GSI on the users table
    pub fn username_index(&self) -> String {
        username_index_name(&self.users_table)
    }

    pub fn user_to_item(&self, user: &User) -> Item {
        let mut item = HashMap::new();
        item.insert("id".to_string(), string_attribute(&user.id));
        item.insert("username".to_string(), string_attribute(&user.username));
        item.insert("email".to_string(), string_attribute(&user.email));
        if !user.groups.is_empty() {
            item.insert(
                "groups".to_string(),
                AttributeValue::Ss(user.groups.iter().cloned().collect()),
            );
        }
        item.insert(
            "date_joined".to_string(),
            string_attribute(user.date_joined.to_rfc3339()),
        );
        item.insert("is_staff".to_string(), AttributeValue::Bool(user.is_staff));
        item.insert("is_active".to_string(), AttributeValue::Bool(user.is_active));
        item
    }

    pub fn item_to_user(&self, item: Item) -> RepositoryResult<User> {
        let date_joined = item
            .get("date_joined")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| RepositoryError::InvalidData {
                message: "Invalid date_joined".to_string(),
            })?;

        Ok(User {
            id: get_string(&item, "id")?,
            username: get_string(&item, "username")?,
            email: get_string(&item, "email").unwrap_or_default(),
            groups: get_string_set(&item, "groups"),
            date_joined,
            is_staff: get_bool(&item, "is_staff").unwrap_or(false),
            is_active: get_bool(&item, "is_active").unwrap_or(true),
        })
    }

    /// Apply an `ADD`/`DELETE` on the groups set of an existing user
    async fn update_groups(
        &self,
        user_id: &str,
        action: &str,
        group_name: &str,
    ) -> RepositoryResult<User> {
        let response = self.telemetry.call("UpdateItem", &self.users_table, async {
            self.client
                .update_item()
                .table_name(&self.users_table)
                .key("id", string_attribute(user_id))
                .update_expression(format!("{} #groups :group", action))
                .condition_expression("attribute_exists(id)")
                .expression_attribute_names("#groups", "groups")
                .expression_attribute_values(
                    ":group",
                    AttributeValue::Ss(vec![group_name.to_string()]),
                )
                .return_values(ReturnValue::AllNew)
                .send()
                .await
                .map_err(|e| match map_dynamodb_error(e.into(), &self.users_table) {
                    RepositoryError::ConstraintViolation { .. } => RepositoryError::NotFound,
                    other => other,
                })
        })
        .await?;

        let attributes = response.attributes.ok_or(RepositoryError::NotFound)?;
        self.item_to_user(attributes)
    }
}

pub(crate) fn username_index_name(users_table: &str) -> String {
    format!("{}-UsernameIndex", users_table)
}

#[async_trait]
impl UserRepository for DynamoDbUserRepository {
    #[instrument(skip(self), fields(table = %self.users_table, user_id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        let response = self.telemetry.call("GetItem", &self.users_table, async {
            self.client
                .get_item()
                .table_name(&self.users_table)
                .key("id", string_attribute(id))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.users_table))
        })
        .await?;

        response.item.map(|item| self.item_to_user(item)).transpose()
    }

    #[instrument(skip(self), fields(table = %self.users_table, username = %username))]
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let response = self.telemetry.call("Query", &self.users_table, async {
            self.client
                .query()
                .table_name(&self.users_table)
                .index_name(self.username_index())
                .key_condition_expression("username = :username")
                .expression_attribute_values(":username", string_attribute(username))
                .limit(1)
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.users_table))
        })
        .await?;

        Ok(parse_items(response.items, |item| self.item_to_user(item), "user")
            .into_iter()
            .next())
    }

    #[instrument(skip(self), fields(table = %self.users_table, group = %group_name))]
    async fn list_group_members(&self, group_name: &str) -> RepositoryResult<Vec<User>> {
        let items = self.telemetry.call("Scan", &self.users_table, async {
            self.client
                .scan()
                .table_name(&self.users_table)
                .filter_expression("contains(#groups, :group)")
                .expression_attribute_names("#groups", "groups")
                .expression_attribute_values(":group", string_attribute(group_name))
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.users_table))
        })
        .await?;

        let users = parse_items(Some(items), |item| self.item_to_user(item), "user");
        info!("Group has {} members", users.len());
        Ok(users)
    }

    #[instrument(skip(self), fields(table = %self.groups_table, group = %name))]
    async fn find_group(&self, name: &str) -> RepositoryResult<Option<Group>> {
        let response = self.telemetry.call("GetItem", &self.groups_table, async {
            self.client
                .get_item()
                .table_name(&self.groups_table)
                .key("name", string_attribute(name))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.groups_table))
        })
        .await?;

        response
            .item
            .map(|item| {
                Ok(Group {
                    id: get_string(&item, "id")?,
                    name: get_string(&item, "name")?,
                })
            })
            .transpose()
    }

    #[instrument(skip(self), fields(table = %self.users_table, user_id = %user_id, group = %group_name))]
    async fn add_to_group(&self, user_id: &str, group_name: &str) -> RepositoryResult<User> {
        let user = self.update_groups(user_id, "ADD", group_name).await?;
        info!("User added to group");
        Ok(user)
    }

    #[instrument(skip(self), fields(table = %self.users_table, user_id = %user_id, group = %group_name))]
    async fn remove_from_group(&self, user_id: &str, group_name: &str) -> RepositoryResult<User> {
        let user = self.update_groups(user_id, "DELETE", group_name).await?;
        info!("User removed from group");
        Ok(user)
    }

    #[instrument(skip(self, user), fields(table = %self.users_table, user_id = %user.id))]
    async fn save_user(&self, user: User) -> RepositoryResult<User> {
        let item = self.user_to_item(&user);
        self.telemetry.call("PutItem", &self.users_table, async {
            self.client
                .put_item()
                .table_name(&self.users_table)
                .set_item(Some(item))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.users_table))
        })
        .await?;

        Ok(user)
    }

    #[instrument(skip(self, group), fields(table = %self.groups_table, group = %group.name))]
    async fn save_group(&self, group: Group) -> RepositoryResult<Group> {
        self.telemetry.call("PutItem", &self.groups_table, async {
            self.client
                .put_item()
                .table_name(&self.groups_table)
                .item("name", string_attribute(&group.name))
                .item("id", string_attribute(&group.id))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.groups_table))
        })
        .await?;

        Ok(group)
    }
}
