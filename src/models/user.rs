use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{generate_id, Role, GROUP_ID_PREFIX, USER_ID_PREFIX};

/// Account known to the service. Credentials live with the upstream authenticator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub groups: BTreeSet<String>,
    pub date_joined: DateTime<Utc>,
    pub is_staff: bool,
    pub is_active: bool,
}

/// Named group of users; membership drives the caller's role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
}

/// Request body for adding a user to a group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddGroupMemberRequest {
    pub username: Option<String>,
}

/// User representation returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub groups: Vec<String>,
    pub date_joined: DateTime<Utc>,
    pub is_staff: bool,
    pub is_active: bool,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: generate_id(USER_ID_PREFIX),
            username: username.into(),
            email: email.into(),
            groups: BTreeSet::new(),
            date_joined: Utc::now(),
            is_staff: false,
            is_active: true,
        }
    }

    /// Builder-style helper used when seeding accounts
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    pub fn with_staff(mut self, is_staff: bool) -> Self {
        self.is_staff = is_staff;
        self
    }

    pub fn role(&self) -> Role {
        Role::from_groups(&self.groups)
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            groups: self.groups.iter().cloned().collect(),
            date_joined: self.date_joined,
            is_staff: self.is_staff,
            is_active: self.is_active,
        }
    }
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id(GROUP_ID_PREFIX),
            name: name.into(),
        }
    }
}

/// Map a group name as written in a URL path ("delivery-crew") to its stored name
pub fn group_name_from_path(segment: &str) -> String {
    segment.trim().replace('-', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DELIVERY_CREW_GROUP, MANAGER_GROUP};

    #[test]
    fn test_user_role_follows_groups() {
        let customer = User::new("ana", "ana@example.com");
        assert_eq!(customer.role(), Role::Customer);

        let crew = User::new("rui", "rui@example.com").with_group(DELIVERY_CREW_GROUP);
        assert_eq!(crew.role(), Role::DeliveryCrew);
        assert!(crew.is_member_of("delivery crew"));

        let manager = crew.with_group(MANAGER_GROUP);
        assert_eq!(manager.role(), Role::Manager);
    }

    #[test]
    fn test_group_name_from_path() {
        assert_eq!(group_name_from_path("delivery-crew"), "delivery crew");
        assert_eq!(group_name_from_path("manager"), "manager");
    }

    #[test]
    fn test_user_response() {
        let user = User::new("ana", "ana@example.com").with_group("manager");
        let response = user.to_response();

        assert_eq!(response.id, user.id);
        assert_eq!(response.groups, vec!["manager".to_string()]);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["username"], "ana");
        assert_eq!(json["is_active"], true);
    }
}
