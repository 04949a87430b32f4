use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{generate_id, CartEntry, ORDER_ID_PREFIX, ORDER_ITEM_ID_PREFIX};

/// Finalized order. `status` is false while pending and true once delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub delivery_crew: Option<String>,
    pub status: bool,
    pub total: Decimal,
    pub date: NaiveDate,
}

/// Immutable line of an order, copied from a cart entry at order creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub menuitem_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub price: Decimal,
}

/// Partial update of an order.
///
/// `delivery_crew` distinguishes an absent field (`None`) from an explicit
/// `null` (`Some(None)`). Any other field lands in `other`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPatch {
    #[serde(default)]
    pub status: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub delivery_crew: Option<Option<String>>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Field-level changes applied to a stored order. Fields left `None` keep
/// whatever value the store holds at write time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderChanges {
    pub status: Option<bool>,
    pub delivery_crew: Option<Option<String>>,
}

/// Summary returned after an order is deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedOrderResponse {
    pub order_id: String,
    pub deleted_order_items: usize,
}

/// Fields the store owns; supplying them in a patch has no effect
pub const READ_ONLY_ORDER_FIELDS: [&str; 5] = ["id", "user", "user_id", "total", "date"];

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl Order {
    /// Build an order owned by `user_id`, dated today, from the given cart entries
    pub fn from_cart(user_id: impl Into<String>, entries: &[CartEntry]) -> (Order, Vec<OrderItem>) {
        let user_id = user_id.into();
        let order = Order {
            id: generate_id(ORDER_ID_PREFIX),
            user_id: user_id.clone(),
            delivery_crew: None,
            status: false,
            total: super::cart_total(entries),
            date: Utc::now().date_naive(),
        };

        let items = entries
            .iter()
            .map(|entry| OrderItem {
                id: generate_id(ORDER_ITEM_ID_PREFIX),
                order_id: order.id.clone(),
                user_id: user_id.clone(),
                menuitem_id: entry.menuitem_id.clone(),
                quantity: entry.quantity,
                unit_price: entry.unit_price,
                price: entry.price,
            })
            .collect();

        (order, items)
    }

    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.delivery_crew.as_deref() == Some(user_id)
    }
}

impl OrderChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.delivery_crew.is_none()
    }

    pub fn apply_to(&self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(delivery_crew) = &self.delivery_crew {
            order.delivery_crew = delivery_crew.clone();
        }
    }
}

impl OrderPatch {
    pub fn status(status: bool) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn assign(delivery_crew: Option<String>) -> Self {
        Self {
            delivery_crew: Some(delivery_crew),
            ..Default::default()
        }
    }

    /// Fields other than `status` and `delivery_crew` that are not read-only
    pub fn unsupported_fields(&self) -> Vec<&str> {
        self.other
            .keys()
            .map(String::as_str)
            .filter(|key| !READ_ONLY_ORDER_FIELDS.contains(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MenuItem;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_from_cart() {
        let salad = MenuItem::new("Greek Salad", dec!(12.50), true, "C1");
        let cake = MenuItem::new("Lemon Cake", dec!(6.75), false, "C2");
        let entries = vec![CartEntry::new("U1", &salad, 2), CartEntry::new("U1", &cake, 1)];

        let (order, items) = Order::from_cart("U1", &entries);

        assert_eq!(order.total, dec!(31.75));
        assert!(!order.status);
        assert!(order.delivery_crew.is_none());
        assert_eq!(order.date, Utc::now().date_naive());
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.order_id == order.id));
        assert_eq!(items[0].price, dec!(25.00));
        assert_eq!(items[1].menuitem_id, cake.id);
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let absent: OrderPatch = serde_json::from_str(r#"{"status": true}"#).unwrap();
        assert_eq!(absent.status, Some(true));
        assert!(absent.delivery_crew.is_none());

        let null: OrderPatch = serde_json::from_str(r#"{"delivery_crew": null}"#).unwrap();
        assert_eq!(null.delivery_crew, Some(None));

        let assigned: OrderPatch =
            serde_json::from_str(r#"{"delivery_crew": "U123"}"#).unwrap();
        assert_eq!(assigned.delivery_crew, Some(Some("U123".to_string())));
    }

    #[test]
    fn test_changes_only_touch_named_fields() {
        let salad = MenuItem::new("Greek Salad", dec!(12.50), true, "C1");
        let (mut order, _) = Order::from_cart("U1", &[CartEntry::new("U1", &salad, 1)]);
        order.delivery_crew = Some("U7".to_string());

        OrderChanges {
            status: Some(true),
            delivery_crew: None,
        }
        .apply_to(&mut order);
        assert!(order.status);
        assert_eq!(order.delivery_crew.as_deref(), Some("U7"));

        OrderChanges {
            status: None,
            delivery_crew: Some(None),
        }
        .apply_to(&mut order);
        assert!(order.status);
        assert!(order.delivery_crew.is_none());
        assert!(OrderChanges::default().is_empty());
    }

    #[test]
    fn test_patch_collects_other_fields() {
        let patch: OrderPatch =
            serde_json::from_str(r#"{"status": false, "total": "1.00", "note": "x"}"#).unwrap();
        assert_eq!(patch.other.len(), 2);
        assert_eq!(patch.unsupported_fields(), vec!["note"]);
    }
}
