use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Name of the group whose members act as managers
pub const MANAGER_GROUP: &str = "manager";

/// Name of the group whose members deliver orders
pub const DELIVERY_CREW_GROUP: &str = "delivery crew";

/// Permission class of a caller, derived from group membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Manager,
    DeliveryCrew,
}

impl Role {
    /// Derive the role from a set of group names.
    ///
    /// Manager membership wins over delivery crew membership; a user in
    /// neither group is a customer.
    pub fn from_groups(groups: &BTreeSet<String>) -> Self {
        if groups.contains(MANAGER_GROUP) {
            Role::Manager
        } else if groups.contains(DELIVERY_CREW_GROUP) {
            Role::DeliveryCrew
        } else {
            Role::Customer
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Manager => write!(f, "manager"),
            Role::DeliveryCrew => write!(f, "delivery_crew"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "manager" => Ok(Role::Manager),
            "delivery_crew" | "delivery crew" | "delivery-crew" => Ok(Role::DeliveryCrew),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Sort key accepted by the menu item listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuOrderingField {
    Price,
    Title,
}

/// Ordering of a menu item listing, parsed from `price`, `-price`, `title`, `-title`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuOrdering {
    pub field: MenuOrderingField,
    pub descending: bool,
}

impl fmt::Display for MenuOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.descending { "-" } else { "" };
        match self.field {
            MenuOrderingField::Price => write!(f, "{}price", prefix),
            MenuOrderingField::Title => write!(f, "{}title", prefix),
        }
    }
}

impl FromStr for MenuOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (descending, name) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let field = match name.to_lowercase().as_str() {
            "price" => MenuOrderingField::Price,
            "title" => MenuOrderingField::Title,
            _ => return Err(format!("Invalid ordering field: {}", s)),
        };

        Ok(MenuOrdering { field, descending })
    }
}
