use crate::models::{Role, ServiceError, ServiceResult, User};

pub const CUSTOMERS_ONLY: &str = "only customers have access";
pub const CUSTOMER_CREATES_ORDERS: &str = "only customer can create order";
pub const CUSTOMER_URL_ONLY: &str = "only customer can access this url";
pub const MANAGERS_ONLY: &str = "only managers have access";
pub const NO_CUSTOMER_ACCESS: &str = "customers don't have access";
pub const CREW_STATUS_ONLY: &str = "delivery crew can only update order status";

/// Authenticated user of the current request together with their role.
///
/// The role is computed once, when the caller is built, and passed explicitly
/// to every service operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user: User,
    pub role: Role,
}

impl Caller {
    pub fn new(user: User) -> Self {
        let role = user.role();
        Self { user, role }
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn require_customer(&self, message: &str) -> ServiceResult<()> {
        match self.role {
            Role::Customer => Ok(()),
            _ => Err(ServiceError::forbidden(message)),
        }
    }

    /// Order updates: managers and delivery crew only
    pub fn reject_customer(&self, message: &str) -> ServiceResult<()> {
        match self.role {
            Role::Customer => Err(ServiceError::forbidden(message)),
            _ => Ok(()),
        }
    }

    pub fn require_manager(&self, message: &str) -> ServiceResult<()> {
        match self.role {
            Role::Manager => Ok(()),
            _ => Err(ServiceError::forbidden(message)),
        }
    }

    /// Catalog writes and group management: managers and staff accounts
    pub fn require_catalog_admin(&self) -> ServiceResult<()> {
        if self.role == Role::Manager || self.user.is_staff {
            Ok(())
        } else {
            Err(ServiceError::forbidden(MANAGERS_ONLY))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DELIVERY_CREW_GROUP, MANAGER_GROUP};

    #[test]
    fn test_caller_role_is_derived_once() {
        let caller = Caller::new(User::new("ana", "ana@example.com"));
        assert_eq!(caller.role, Role::Customer);
        assert_eq!(caller.username(), "ana");
        assert!(caller.require_customer(CUSTOMERS_ONLY).is_ok());
        assert!(caller.require_manager(MANAGERS_ONLY).is_err());
    }

    #[test]
    fn test_forbidden_carries_message() {
        let crew = Caller::new(User::new("rui", "rui@example.com").with_group(DELIVERY_CREW_GROUP));
        match crew.require_customer(CUSTOMER_CREATES_ORDERS) {
            Err(ServiceError::Forbidden { message }) => {
                assert_eq!(message, "only customer can create order")
            }
            other => panic!("Expected Forbidden, got {:?}", other),
        }
    }

    #[test]
    fn test_catalog_admin() {
        let manager = Caller::new(User::new("maria", "m@example.com").with_group(MANAGER_GROUP));
        let staff = Caller::new(User::new("root", "root@example.com").with_staff(true));
        let customer = Caller::new(User::new("ana", "ana@example.com"));
        let crew = Caller::new(User::new("rui", "rui@example.com").with_group(DELIVERY_CREW_GROUP));

        assert!(manager.require_catalog_admin().is_ok());
        assert!(staff.require_catalog_admin().is_ok());
        assert!(customer.require_catalog_admin().is_err());
        assert!(crew.require_catalog_admin().is_err());
    }
}
