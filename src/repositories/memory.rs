//! In-process store implementing every repository trait, used for local
//! development, tests and benchmarks.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{CartRepository, MenuRepository, OrderRepository, UserRepository};
use crate::models::{
    CartEntry, Category, Group, MenuItem, Order, OrderChanges, OrderItem, RepositoryError,
    RepositoryResult, User,
};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<String, User>,
    groups: BTreeMap<String, Group>,
    categories: Vec<Category>,
    menu_items: Vec<MenuItem>,
    cart_entries: Vec<CartEntry>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
}

/// Entity store held in memory behind a single lock.
///
/// Lists keep insertion order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn list_group_members(&self, group_name: &str) -> RepositoryResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|user| user.is_member_of(group_name))
            .cloned()
            .collect())
    }

    async fn find_group(&self, name: &str) -> RepositoryResult<Option<Group>> {
        Ok(self.state.read().await.groups.get(name).cloned())
    }

    async fn add_to_group(&self, user_id: &str, group_name: &str) -> RepositoryResult<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or(RepositoryError::NotFound)?;
        user.groups.insert(group_name.to_string());
        Ok(user.clone())
    }

    async fn remove_from_group(&self, user_id: &str, group_name: &str) -> RepositoryResult<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or(RepositoryError::NotFound)?;
        user.groups.remove(group_name);
        Ok(user.clone())
    }

    async fn save_user(&self, user: User) -> RepositoryResult<User> {
        let mut state = self.state.write().await;
        state.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn save_group(&self, group: Group) -> RepositoryResult<Group> {
        let mut state = self.state.write().await;
        state.groups.insert(group.name.clone(), group.clone());
        Ok(group)
    }
}

#[async_trait]
impl MenuRepository for InMemoryStore {
    async fn list_categories(&self) -> RepositoryResult<Vec<Category>> {
        Ok(self.state.read().await.categories.clone())
    }

    async fn find_category(&self, id: &str) -> RepositoryResult<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn find_category_by_slug(&self, slug: &str) -> RepositoryResult<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn create_category(&self, category: Category) -> RepositoryResult<Category> {
        let mut state = self.state.write().await;
        if state.categories.iter().any(|c| c.id == category.id) {
            return Err(RepositoryError::ConstraintViolation {
                message: format!("{} already exists", category.id),
            });
        }
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, category: Category) -> RepositoryResult<Category> {
        let mut state = self.state.write().await;
        let existing = state
            .categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = category.clone();
        Ok(category)
    }

    async fn delete_category(&self, id: &str) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        if state.categories.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_menu_items(
        &self,
        category_id: Option<&str>,
        featured: Option<bool>,
    ) -> RepositoryResult<Vec<MenuItem>> {
        let state = self.state.read().await;
        Ok(state
            .menu_items
            .iter()
            .filter(|item| category_id.map_or(true, |id| item.category_id == id))
            .filter(|item| featured.map_or(true, |flag| item.featured == flag))
            .cloned()
            .collect())
    }

    async fn find_menu_item(&self, id: &str) -> RepositoryResult<Option<MenuItem>> {
        let state = self.state.read().await;
        Ok(state.menu_items.iter().find(|item| item.id == id).cloned())
    }

    async fn create_menu_item(&self, item: MenuItem) -> RepositoryResult<MenuItem> {
        let mut state = self.state.write().await;
        if state.menu_items.iter().any(|existing| existing.id == item.id) {
            return Err(RepositoryError::ConstraintViolation {
                message: format!("{} already exists", item.id),
            });
        }
        state.menu_items.push(item.clone());
        Ok(item)
    }

    async fn update_menu_item(&self, item: MenuItem) -> RepositoryResult<MenuItem> {
        let mut state = self.state.write().await;
        let existing = state
            .menu_items
            .iter_mut()
            .find(|existing| existing.id == item.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = item.clone();
        Ok(item)
    }

    async fn delete_menu_item(&self, id: &str) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let before = state.menu_items.len();
        state.menu_items.retain(|item| item.id != id);
        if state.menu_items.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count_menu_items_in_category(&self, category_id: &str) -> RepositoryResult<usize> {
        let state = self.state.read().await;
        Ok(state
            .menu_items
            .iter()
            .filter(|item| item.category_id == category_id)
            .count())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn find_entries(&self, user_id: &str) -> RepositoryResult<Vec<CartEntry>> {
        let state = self.state.read().await;
        Ok(state
            .cart_entries
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_entry(&self, entry: CartEntry) -> RepositoryResult<CartEntry> {
        let mut state = self.state.write().await;
        state.cart_entries.push(entry.clone());
        Ok(entry)
    }

    async fn delete_entries(&self, user_id: &str) -> RepositoryResult<usize> {
        let mut state = self.state.write().await;
        let before = state.cart_entries.len();
        state.cart_entries.retain(|entry| entry.user_id != user_id);
        Ok(before - state.cart_entries.len())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    #[instrument(skip(self, order, items, consumed), fields(order_id = %order.id))]
    async fn place_order(
        &self,
        order: Order,
        items: Vec<OrderItem>,
        consumed: &[CartEntry],
    ) -> RepositoryResult<Order> {
        let mut state = self.state.write().await;

        if state.orders.iter().any(|existing| existing.id == order.id) {
            return Err(RepositoryError::TransactionFailed {
                message: format!("order {} already exists", order.id),
            });
        }
        let missing = consumed
            .iter()
            .find(|entry| !state.cart_entries.iter().any(|e| e.id == entry.id));
        if let Some(entry) = missing {
            return Err(RepositoryError::TransactionFailed {
                message: format!("cart entry {} no longer exists", entry.id),
            });
        }

        state
            .cart_entries
            .retain(|entry| !consumed.iter().any(|c| c.id == entry.id));
        state.order_items.extend(items);
        state.orders.push(order.clone());
        debug!("Order stored");
        Ok(order)
    }

    async fn find_order(&self, id: &str) -> RepositoryResult<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|order| order.id == id).cloned())
    }

    async fn find_orders_for_delivery_crew(&self, crew_id: &str) -> RepositoryResult<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|order| order.is_assigned_to(crew_id))
            .cloned()
            .collect())
    }

    async fn find_items_for_order(&self, order_id: &str) -> RepositoryResult<Vec<OrderItem>> {
        let state = self.state.read().await;
        Ok(state
            .order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn find_items_for_user(&self, user_id: &str) -> RepositoryResult<Vec<OrderItem>> {
        let state = self.state.read().await;
        Ok(state
            .order_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_all_items(&self) -> RepositoryResult<Vec<OrderItem>> {
        Ok(self.state.read().await.order_items.clone())
    }

    async fn update_order(
        &self,
        id: &str,
        changes: OrderChanges,
        assignee: Option<&str>,
    ) -> RepositoryResult<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|order| order.id == id)
            .filter(|order| assignee.map_or(true, |user_id| order.is_assigned_to(user_id)))
            .ok_or(RepositoryError::NotFound)?;
        changes.apply_to(order);
        Ok(order.clone())
    }

    async fn delete_order(&self, id: &str) -> RepositoryResult<usize> {
        let mut state = self.state.write().await;
        let before = state.orders.len();
        state.orders.retain(|order| order.id != id);
        if state.orders.len() == before {
            return Err(RepositoryError::NotFound);
        }
        let items_before = state.order_items.len();
        state.order_items.retain(|item| item.order_id != id);
        Ok(items_before - state.order_items.len())
    }
}
