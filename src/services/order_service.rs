use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::access_policy::{
    CREW_STATUS_ONLY, CUSTOMER_CREATES_ORDERS, CUSTOMER_URL_ONLY, MANAGERS_ONLY,
    NO_CUSTOMER_ACCESS,
};
use super::Caller;
use crate::models::{
    cart_total, validate_order_total, DeletedOrderResponse, Order, OrderChanges, OrderItem,
    OrderPatch, RepositoryError, Role, ServiceError, ServiceResult, DELIVERY_CREW_GROUP,
    MAX_ORDER_ENTRIES,
};
use crate::repositories::{CartRepository, OrderRepository, UserRepository};

/// Service for the order lifecycle: placing an order from a cart and the
/// role-scoped reads and writes that follow.
pub struct OrderService {
    order_repository: Arc<dyn OrderRepository>,
    cart_repository: Arc<dyn CartRepository>,
    user_repository: Arc<dyn UserRepository>,
}

impl OrderService {
    pub fn new(
        order_repository: Arc<dyn OrderRepository>,
        cart_repository: Arc<dyn CartRepository>,
        user_repository: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            order_repository,
            cart_repository,
            user_repository,
        }
    }

    /// Order items visible to the caller: their own (customer), all (manager)
    /// or those on orders assigned to them (delivery crew).
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id(), role = %caller.role))]
    pub async fn list_orders(&self, caller: &Caller) -> ServiceResult<Vec<OrderItem>> {
        let items = match caller.role {
            Role::Customer => {
                self.order_repository
                    .find_items_for_user(caller.user_id())
                    .await?
            }
            Role::Manager => self.order_repository.find_all_items().await?,
            Role::DeliveryCrew => {
                let orders = self
                    .order_repository
                    .find_orders_for_delivery_crew(caller.user_id())
                    .await?;
                let mut items = Vec::new();
                for order in orders {
                    items.extend(self.order_repository.find_items_for_order(&order.id).await?);
                }
                items
            }
        };

        info!("Found {} order items", items.len());
        Ok(items)
    }

    /// Turn the caller's cart into an order.
    ///
    /// The order, its items and the removal of the consumed cart entries are
    /// written in one store transaction.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id()))]
    pub async fn create_order(&self, caller: &Caller) -> ServiceResult<Order> {
        caller.require_customer(CUSTOMER_CREATES_ORDERS)?;

        let entries = self.cart_repository.find_entries(caller.user_id()).await?;
        if entries.is_empty() {
            return Err(ServiceError::validation("cart is empty"));
        }
        if entries.len() > MAX_ORDER_ENTRIES {
            return Err(ServiceError::validation(format!(
                "cart has {} entries; at most {} can be ordered at once",
                entries.len(),
                MAX_ORDER_ENTRIES
            )));
        }

        validate_order_total(&cart_total(&entries))?;

        let (order, items) = Order::from_cart(caller.user_id(), &entries);
        let item_count = items.len();
        let order = self
            .order_repository
            .place_order(order, items, &entries)
            .await?;

        crate::info_with_trace!(
            order_id = %order.id,
            total = %order.total,
            item_count = item_count,
            "Order created"
        );
        Ok(order)
    }

    /// Items of one of the caller's own orders
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id(), order_id = %order_id))]
    pub async fn retrieve_order(
        &self,
        caller: &Caller,
        order_id: &str,
    ) -> ServiceResult<Vec<OrderItem>> {
        caller.require_customer(CUSTOMER_URL_ONLY)?;

        let order = self.find_order(order_id).await?;
        if order.user_id != caller.user_id() {
            return Err(ServiceError::OrderNotFound {
                id: order_id.to_string(),
            });
        }

        Ok(self.order_repository.find_items_for_order(&order.id).await?)
    }

    /// Apply a patch according to the caller's role
    #[instrument(skip(self, caller, patch), fields(user_id = %caller.user_id(), role = %caller.role, order_id = %order_id))]
    pub async fn update_order(
        &self,
        caller: &Caller,
        order_id: &str,
        patch: OrderPatch,
    ) -> ServiceResult<Order> {
        caller.reject_customer(NO_CUSTOMER_ACCESS)?;
        let order = self.find_order(order_id).await?;

        let (changes, assignee) = match caller.role {
            Role::Manager => (self.manager_changes(patch).await?, None),
            _ => (crew_changes(caller, &order, patch)?, Some(caller.user_id())),
        };

        let order = self
            .order_repository
            .update_order(&order.id, changes, assignee)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ServiceError::OrderNotFound {
                    id: order_id.to_string(),
                },
                other => other.into(),
            })?;

        crate::info_with_trace!(status = order.status, delivery_crew = ?order.delivery_crew, "Order updated");
        Ok(order)
    }

    async fn manager_changes(&self, patch: OrderPatch) -> ServiceResult<OrderChanges> {
        if !patch.other.is_empty() {
            debug!("Ignoring order fields: {:?}", patch.other.keys().collect::<Vec<_>>());
        }

        let delivery_crew = match patch.delivery_crew {
            Some(Some(crew_id)) => Some(Some(self.delivery_crew_member(&crew_id).await?)),
            other => other,
        };
        Ok(OrderChanges {
            status: patch.status,
            delivery_crew,
        })
    }

    /// Resolve an assignee, who must exist and belong to the delivery crew group
    async fn delivery_crew_member(&self, user_id: &str) -> ServiceResult<String> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| {
                ServiceError::validation(format!("user '{}' does not exist", user_id))
            })?;

        if !user.is_member_of(DELIVERY_CREW_GROUP) {
            return Err(ServiceError::validation(format!(
                "user '{}' is not in the delivery crew",
                user.username
            )));
        }
        Ok(user.id)
    }

    /// Delete an order and its items
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id(), order_id = %order_id))]
    pub async fn delete_order(
        &self,
        caller: &Caller,
        order_id: &str,
    ) -> ServiceResult<DeletedOrderResponse> {
        caller.require_manager(MANAGERS_ONLY)?;
        let order = self.find_order(order_id).await?;

        let deleted_order_items = self
            .order_repository
            .delete_order(&order.id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ServiceError::OrderNotFound {
                    id: order_id.to_string(),
                },
                other => other.into(),
            })?;

        crate::info_with_trace!(deleted_order_items = deleted_order_items, "Order deleted");
        Ok(DeletedOrderResponse {
            order_id: order.id,
            deleted_order_items,
        })
    }

    async fn find_order(&self, order_id: &str) -> ServiceResult<Order> {
        self.order_repository
            .find_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound {
                id: order_id.to_string(),
            })
    }
}

/// Delivery crew may only toggle the status of orders assigned to them.
/// Read-only fields are ignored; restating the current assignee is a no-op.
/// The assignment is checked again when the change is written.
fn crew_changes(caller: &Caller, order: &Order, patch: OrderPatch) -> ServiceResult<OrderChanges> {
    if !order.is_assigned_to(caller.user_id()) {
        return Err(ServiceError::OrderNotFound {
            id: order.id.clone(),
        });
    }

    let reassigns = patch
        .delivery_crew
        .as_ref()
        .map_or(false, |assignee| *assignee != order.delivery_crew);
    if reassigns || !patch.unsupported_fields().is_empty() {
        return Err(ServiceError::validation(CREW_STATUS_ONLY));
    }

    Ok(OrderChanges {
        status: patch.status,
        delivery_crew: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CartEntry, Category, Group, MenuItem, User, DELIVERY_CREW_GROUP, MANAGER_GROUP,
    };
    use crate::repositories::{InMemoryStore, MenuRepository};
    use async_trait::async_trait;
    use mockall::mock;
    use rust_decimal_macros::dec;

    mock! {
        TestCartRepository {}

        #[async_trait]
        impl CartRepository for TestCartRepository {
            async fn find_entries(&self, user_id: &str) -> Result<Vec<CartEntry>, RepositoryError>;
            async fn add_entry(&self, entry: CartEntry) -> Result<CartEntry, RepositoryError>;
            async fn delete_entries(&self, user_id: &str) -> Result<usize, RepositoryError>;
        }
    }

    /// Order store whose reads race with a manager reassigning the order
    /// before the service gets to write
    struct ReassignOnRead {
        store: Arc<InMemoryStore>,
        delivery_crew: Option<String>,
    }

    #[async_trait]
    impl OrderRepository for ReassignOnRead {
        async fn place_order(
            &self,
            order: Order,
            items: Vec<OrderItem>,
            consumed: &[CartEntry],
        ) -> Result<Order, RepositoryError> {
            self.store.place_order(order, items, consumed).await
        }

        async fn find_order(&self, id: &str) -> Result<Option<Order>, RepositoryError> {
            let order = self.store.find_order(id).await?;
            let reassign = OrderChanges {
                status: None,
                delivery_crew: Some(self.delivery_crew.clone()),
            };
            self.store.update_order(id, reassign, None).await?;
            Ok(order)
        }

        async fn find_orders_for_delivery_crew(
            &self,
            crew_id: &str,
        ) -> Result<Vec<Order>, RepositoryError> {
            self.store.find_orders_for_delivery_crew(crew_id).await
        }

        async fn find_items_for_order(&self, order_id: &str) -> Result<Vec<OrderItem>, RepositoryError> {
            self.store.find_items_for_order(order_id).await
        }

        async fn find_items_for_user(&self, user_id: &str) -> Result<Vec<OrderItem>, RepositoryError> {
            self.store.find_items_for_user(user_id).await
        }

        async fn find_all_items(&self) -> Result<Vec<OrderItem>, RepositoryError> {
            self.store.find_all_items().await
        }

        async fn update_order(
            &self,
            id: &str,
            changes: OrderChanges,
            assignee: Option<&str>,
        ) -> Result<Order, RepositoryError> {
            self.store.update_order(id, changes, assignee).await
        }

        async fn delete_order(&self, id: &str) -> Result<usize, RepositoryError> {
            self.store.delete_order(id).await
        }
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: OrderService,
        ana: Caller,
        ben: Caller,
        manager: Caller,
        crew: Caller,
        salad: MenuItem,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store.save_group(Group::new(MANAGER_GROUP)).await.unwrap();
        store.save_group(Group::new(DELIVERY_CREW_GROUP)).await.unwrap();

        let ana = store.save_user(User::new("ana", "ana@example.com")).await.unwrap();
        let ben = store.save_user(User::new("ben", "ben@example.com")).await.unwrap();
        let manager = store
            .save_user(User::new("maria", "maria@example.com").with_group(MANAGER_GROUP))
            .await
            .unwrap();
        let crew = store
            .save_user(User::new("rui", "rui@example.com").with_group(DELIVERY_CREW_GROUP))
            .await
            .unwrap();

        let category = store
            .create_category(Category::new("mains", "Mains"))
            .await
            .unwrap();
        let salad = store
            .create_menu_item(MenuItem::new("Greek Salad", dec!(12.50), true, category.id))
            .await
            .unwrap();

        let service = OrderService::new(store.clone(), store.clone(), store.clone());

        Fixture {
            store,
            service,
            ana: Caller::new(ana),
            ben: Caller::new(ben),
            manager: Caller::new(manager),
            crew: Caller::new(crew),
            salad,
        }
    }

    async fn add(f: &Fixture, caller: &Caller, quantity: u32) {
        f.store
            .add_entry(CartEntry::new(caller.user_id(), &f.salad, quantity))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_order_from_cart() {
        let f = fixture().await;
        add(&f, &f.ana, 2).await;

        let order = f.service.create_order(&f.ana).await.unwrap();

        assert_eq!(order.total, dec!(25.00));
        assert_eq!(order.user_id, f.ana.user_id());
        assert!(!order.status);
        assert!(f.store.find_entries(f.ana.user_id()).await.unwrap().is_empty());

        let items = f.service.retrieve_order(&f.ana, &order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price, dec!(12.50));
        assert_eq!(items[0].price, dec!(25.00));
    }

    #[tokio::test]
    async fn test_create_order_rejects_empty_cart() {
        let f = fixture().await;
        let result = f.service.create_order(&f.ana).await;
        assert!(matches!(result, Err(ServiceError::ValidationError { .. })));
        assert!(f.store.find_all_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_order_rejects_oversized_cart() {
        let f = fixture().await;
        let salad = f.salad.clone();
        let user_id = f.ana.user_id().to_string();
        let mut mock_cart_repo = MockTestCartRepository::new();
        mock_cart_repo
            .expect_find_entries()
            .times(1)
            .returning(move |_| {
                Ok((0..=MAX_ORDER_ENTRIES)
                    .map(|_| CartEntry::new(user_id.clone(), &salad, 1))
                    .collect())
            });

        let service = OrderService::new(f.store.clone(), Arc::new(mock_cart_repo), f.store.clone());
        let result = service.create_order(&f.ana).await;
        assert!(matches!(result, Err(ServiceError::ValidationError { .. })));
    }

    #[tokio::test]
    async fn test_create_order_rejects_total_above_six_digits() {
        let f = fixture().await;
        let banquet = f
            .store
            .create_menu_item(MenuItem::new("Banquet", dec!(9999.99), false, &f.salad.category_id))
            .await
            .unwrap();
        f.store
            .add_entry(CartEntry::new(f.ana.user_id(), &banquet, 1000))
            .await
            .unwrap();

        let result = f.service.create_order(&f.ana).await;
        assert!(matches!(result, Err(ServiceError::ValidationError { .. })));

        // Nothing was written and the cart is intact
        assert!(f.store.find_all_items().await.unwrap().is_empty());
        assert_eq!(f.store.find_entries(f.ana.user_id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_order_accepts_total_at_limit() {
        let f = fixture().await;
        let banquet = f
            .store
            .create_menu_item(MenuItem::new("Banquet", dec!(9999.99), false, &f.salad.category_id))
            .await
            .unwrap();
        f.store
            .add_entry(CartEntry::new(f.ana.user_id(), &banquet, 1))
            .await
            .unwrap();

        let order = f.service.create_order(&f.ana).await.unwrap();
        assert_eq!(order.total, dec!(9999.99));
    }

    #[tokio::test]
    async fn test_only_customers_create_orders() {
        let f = fixture().await;
        for caller in [&f.manager, &f.crew] {
            match f.service.create_order(caller).await {
                Err(ServiceError::Forbidden { message }) => {
                    assert_eq!(message, CUSTOMER_CREATES_ORDERS)
                }
                other => panic!("Expected Forbidden, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_retrieve_other_customers_order_is_not_found() {
        let f = fixture().await;
        add(&f, &f.ana, 1).await;
        let order = f.service.create_order(&f.ana).await.unwrap();

        let result = f.service.retrieve_order(&f.ben, &order.id).await;
        assert!(matches!(result, Err(ServiceError::OrderNotFound { .. })));

        let result = f.service.retrieve_order(&f.manager, &order.id).await;
        assert!(matches!(result, Err(ServiceError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_list_orders_by_role() {
        let f = fixture().await;
        add(&f, &f.ana, 1).await;
        add(&f, &f.ana, 2).await;
        let ana_order = f.service.create_order(&f.ana).await.unwrap();
        add(&f, &f.ben, 3).await;
        f.service.create_order(&f.ben).await.unwrap();

        assert_eq!(f.service.list_orders(&f.ana).await.unwrap().len(), 2);
        assert_eq!(f.service.list_orders(&f.ben).await.unwrap().len(), 1);
        assert_eq!(f.service.list_orders(&f.manager).await.unwrap().len(), 3);
        assert!(f.service.list_orders(&f.crew).await.unwrap().is_empty());

        f.service
            .update_order(
                &f.manager,
                &ana_order.id,
                OrderPatch::assign(Some(f.crew.user_id().to_string())),
            )
            .await
            .unwrap();

        let crew_items = f.service.list_orders(&f.crew).await.unwrap();
        assert_eq!(crew_items.len(), 2);
        assert!(crew_items.iter().all(|item| item.order_id == ana_order.id));
    }

    #[tokio::test]
    async fn test_manager_assignment_rules() {
        let f = fixture().await;
        add(&f, &f.ana, 1).await;
        let order = f.service.create_order(&f.ana).await.unwrap();

        let result = f
            .service
            .update_order(
                &f.manager,
                &order.id,
                OrderPatch::assign(Some(f.ben.user_id().to_string())),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::ValidationError { .. })));

        let result = f
            .service
            .update_order(&f.manager, &order.id, OrderPatch::assign(Some("Unobody".to_string())))
            .await;
        assert!(matches!(result, Err(ServiceError::ValidationError { .. })));

        let assigned = f
            .service
            .update_order(
                &f.manager,
                &order.id,
                OrderPatch::assign(Some(f.crew.user_id().to_string())),
            )
            .await
            .unwrap();
        assert!(assigned.is_assigned_to(f.crew.user_id()));

        let unassigned = f
            .service
            .update_order(&f.manager, &order.id, OrderPatch::assign(None))
            .await
            .unwrap();
        assert!(unassigned.delivery_crew.is_none());
    }

    #[tokio::test]
    async fn test_manager_patch_ignores_read_only_fields() {
        let f = fixture().await;
        add(&f, &f.ana, 2).await;
        let order = f.service.create_order(&f.ana).await.unwrap();

        let patch: OrderPatch =
            serde_json::from_str(r#"{"status": true, "total": "0.01", "user": "U0"}"#).unwrap();
        let updated = f
            .service
            .update_order(&f.manager, &order.id, patch)
            .await
            .unwrap();

        assert!(updated.status);
        assert_eq!(updated.total, dec!(25.00));
        assert_eq!(updated.user_id, order.user_id);
        assert_eq!(updated.date, order.date);
    }

    #[tokio::test]
    async fn test_delivery_crew_updates_status_only() {
        let f = fixture().await;
        add(&f, &f.ana, 1).await;
        let order = f.service.create_order(&f.ana).await.unwrap();

        // not yet assigned to them
        let result = f
            .service
            .update_order(&f.crew, &order.id, OrderPatch::status(true))
            .await;
        assert!(matches!(result, Err(ServiceError::OrderNotFound { .. })));

        f.service
            .update_order(
                &f.manager,
                &order.id,
                OrderPatch::assign(Some(f.crew.user_id().to_string())),
            )
            .await
            .unwrap();

        let result = f
            .service
            .update_order(&f.crew, &order.id, OrderPatch::assign(None))
            .await;
        match result {
            Err(ServiceError::ValidationError { message }) => assert_eq!(message, CREW_STATUS_ONLY),
            other => panic!("Expected ValidationError, got {:?}", other),
        }

        let delivered = f
            .service
            .update_order(&f.crew, &order.id, OrderPatch::status(true))
            .await
            .unwrap();
        assert!(delivered.status);
        assert!(delivered.is_assigned_to(f.crew.user_id()));
        assert_eq!(delivered.total, order.total);
    }

    #[tokio::test]
    async fn test_crew_update_fails_once_order_is_taken_away() {
        let f = fixture().await;
        add(&f, &f.ana, 1).await;
        let order = f.service.create_order(&f.ana).await.unwrap();
        f.service
            .update_order(
                &f.manager,
                &order.id,
                OrderPatch::assign(Some(f.crew.user_id().to_string())),
            )
            .await
            .unwrap();

        let racing = OrderService::new(
            Arc::new(ReassignOnRead {
                store: f.store.clone(),
                delivery_crew: None,
            }),
            f.store.clone(),
            f.store.clone(),
        );
        let result = racing
            .update_order(&f.crew, &order.id, OrderPatch::status(true))
            .await;
        assert!(matches!(result, Err(ServiceError::OrderNotFound { .. })));

        let stored = f.store.find_order(&order.id).await.unwrap().unwrap();
        assert!(!stored.status);
        assert!(stored.delivery_crew.is_none());
    }

    #[tokio::test]
    async fn test_manager_status_change_keeps_concurrent_assignment() {
        let f = fixture().await;
        add(&f, &f.ana, 1).await;
        let order = f.service.create_order(&f.ana).await.unwrap();

        let racing = OrderService::new(
            Arc::new(ReassignOnRead {
                store: f.store.clone(),
                delivery_crew: Some(f.crew.user_id().to_string()),
            }),
            f.store.clone(),
            f.store.clone(),
        );
        let updated = racing
            .update_order(&f.manager, &order.id, OrderPatch::status(true))
            .await
            .unwrap();

        assert!(updated.status);
        assert!(updated.is_assigned_to(f.crew.user_id()));
    }

    #[tokio::test]
    async fn test_customers_cannot_update() {
        let f = fixture().await;
        let result = f
            .service
            .update_order(&f.ana, "Oanything", OrderPatch::status(true))
            .await;
        match result {
            Err(ServiceError::Forbidden { message }) => assert_eq!(message, NO_CUSTOMER_ACCESS),
            other => panic!("Expected Forbidden, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_manager_deletes_order_with_items() {
        let f = fixture().await;
        add(&f, &f.ana, 1).await;
        add(&f, &f.ana, 4).await;
        let order = f.service.create_order(&f.ana).await.unwrap();

        let result = f.service.delete_order(&f.crew, &order.id).await;
        assert!(matches!(result, Err(ServiceError::Forbidden { .. })));

        let deleted = f.service.delete_order(&f.manager, &order.id).await.unwrap();
        assert_eq!(deleted.deleted_order_items, 2);
        assert!(f.store.find_order(&order.id).await.unwrap().is_none());
        assert!(f.store.find_items_for_order(&order.id).await.unwrap().is_empty());

        let result = f.service.delete_order(&f.manager, &order.id).await;
        assert!(matches!(result, Err(ServiceError::OrderNotFound { .. })));
    }
}
