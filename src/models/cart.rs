use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{generate_id, MenuItem, CART_ENTRY_ID_PREFIX};

/// Pending line item in a customer's cart.
///
/// `unit_price` is a snapshot of the menu item price at the time it was added;
/// `price` is always `unit_price * quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    pub id: String,
    pub user_id: String,
    pub menuitem_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub price: Decimal,
}

/// Request model for adding an item to the cart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddCartItemRequest {
    pub menuitem: Option<String>,
    pub quantity: Option<i64>,
}

/// Response model for clearing the cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearCartResponse {
    pub deleted: usize,
}

impl CartEntry {
    pub fn new(user_id: impl Into<String>, menu_item: &MenuItem, quantity: u32) -> Self {
        let unit_price = menu_item.price;
        Self {
            id: generate_id(CART_ENTRY_ID_PREFIX),
            user_id: user_id.into(),
            menuitem_id: menu_item.id.clone(),
            quantity,
            unit_price,
            price: unit_price * Decimal::from(quantity),
        }
    }
}

/// Sum of the line prices of a set of cart entries
pub fn cart_total(entries: &[CartEntry]) -> Decimal {
    entries.iter().map(|entry| entry.price).sum()
}
