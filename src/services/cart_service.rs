use std::sync::Arc;
use tracing::{info, instrument};

use super::access_policy::CUSTOMERS_ONLY;
use super::Caller;
use crate::models::{
    validate_cart_quantity, AddCartItemRequest, CartEntry, ServiceError, ServiceResult,
};
use crate::repositories::{CartRepository, MenuRepository};

/// Service for managing shopping carts. Only customers own carts.
pub struct CartService {
    cart_repository: Arc<dyn CartRepository>,
    menu_repository: Arc<dyn MenuRepository>,
}

impl CartService {
    /// Create a new CartService
    pub fn new(
        cart_repository: Arc<dyn CartRepository>,
        menu_repository: Arc<dyn MenuRepository>,
    ) -> Self {
        Self {
            cart_repository,
            menu_repository,
        }
    }

    /// Entries in the caller's cart
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id()))]
    pub async fn list_cart(&self, caller: &Caller) -> ServiceResult<Vec<CartEntry>> {
        caller.require_customer(CUSTOMERS_ONLY)?;

        let entries = self.cart_repository.find_entries(caller.user_id()).await?;
        info!("Cart has {} entries", entries.len());
        Ok(entries)
    }

    /// Add one entry to the caller's cart, snapshotting the current menu price
    #[instrument(skip(self, caller, request), fields(user_id = %caller.user_id(), menuitem = ?request.menuitem, quantity = ?request.quantity))]
    pub async fn add_to_cart(
        &self,
        caller: &Caller,
        request: AddCartItemRequest,
    ) -> ServiceResult<CartEntry> {
        caller.require_customer(CUSTOMERS_ONLY)?;

        let menuitem_id = request
            .menuitem
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ServiceError::validation("menuitem is required"))?;
        let quantity = validate_cart_quantity(request.quantity)?;

        let menu_item = self
            .menu_repository
            .find_menu_item(menuitem_id)
            .await?
            .ok_or_else(|| {
                ServiceError::validation(format!("menu item '{}' does not exist", menuitem_id))
            })?;

        let entry = CartEntry::new(caller.user_id(), &menu_item, quantity);
        let entry = self.cart_repository.add_entry(entry).await?;

        crate::info_with_trace!(entry_id = %entry.id, price = %entry.price, "Item added to cart");
        Ok(entry)
    }

    /// Remove every entry from the caller's cart
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id()))]
    pub async fn clear_cart(&self, caller: &Caller) -> ServiceResult<usize> {
        caller.require_customer(CUSTOMERS_ONLY)?;

        let removed = self.cart_repository.delete_entries(caller.user_id()).await?;
        crate::info_with_trace!("Cleared {} cart entries", removed);
        Ok(removed)
    }
}
