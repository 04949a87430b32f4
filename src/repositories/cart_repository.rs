use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use super::dynamodb::{
    decimal_attribute, get_decimal, get_number, get_string, map_dynamodb_error, parse_items,
    string_attribute, DynamoDbTelemetry, Item,
};
use crate::models::{CartEntry, RepositoryResult};

/// Trait defining the interface for cart data access operations
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// All entries owned by a user
    async fn find_entries(&self, user_id: &str) -> RepositoryResult<Vec<CartEntry>>;

    /// Persist a new entry
    async fn add_entry(&self, entry: CartEntry) -> RepositoryResult<CartEntry>;

    /// Delete every entry owned by a user, returning how many were removed
    async fn delete_entries(&self, user_id: &str) -> RepositoryResult<usize>;
}

/// DynamoDB implementation of the CartRepository trait.
///
/// Table key: `user_id` (hash) + `id` (range).
pub struct DynamoDbCartRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    telemetry: DynamoDbTelemetry,
}

impl DynamoDbCartRepository {
    /// Create a new DynamoDB cart repository
    pub fn new(
        client: Arc<DynamoDbClient>,
        table_name: String,
        telemetry: DynamoDbTelemetry,
    ) -> Self {
        Self {
            client,
            table_name,
            telemetry,
        }
    }

    /// Get the table name (for testing)
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Convert a CartEntry to DynamoDB attribute values
    pub fn entry_to_item(&self, entry: &CartEntry) -> Item {
        cart_entry_to_item(entry)
    }

    /// Convert a DynamoDB item to a CartEntry
    pub fn item_to_entry(&self, item: Item) -> RepositoryResult<CartEntry> {
        Ok(CartEntry {
            id: get_string(&item, "id")?,
            user_id: get_string(&item, "user_id")?,
            menuitem_id: get_string(&item, "menuitem_id")?,
            quantity: get_number(&item, "quantity")?,
            unit_price: get_decimal(&item, "unit_price")?,
            price: get_decimal(&item, "price")?,
        })
    }
}

pub(crate) fn cart_entry_to_item(entry: &CartEntry) -> Item {
    let mut item = HashMap::new();
    item.insert("user_id".to_string(), string_attribute(&entry.user_id));
    item.insert("id".to_string(), string_attribute(&entry.id));
    item.insert(
        "menuitem_id".to_string(),
        string_attribute(&entry.menuitem_id),
    );
    item.insert(
        "quantity".to_string(),
        AttributeValue::N(entry.quantity.to_string()),
    );
    item.insert("unit_price".to_string(), decimal_attribute(entry.unit_price));
    item.insert("price".to_string(), decimal_attribute(entry.price));
    item
}

/// Primary key of a cart entry
pub(crate) fn cart_entry_key(entry: &CartEntry) -> Item {
    let mut key = HashMap::new();
    key.insert("user_id".to_string(), string_attribute(&entry.user_id));
    key.insert("id".to_string(), string_attribute(&entry.id));
    key
}

#[async_trait]
impl CartRepository for DynamoDbCartRepository {
    #[instrument(skip(self), fields(table = %self.table_name, user_id = %user_id))]
    async fn find_entries(&self, user_id: &str) -> RepositoryResult<Vec<CartEntry>> {
        let items = self.telemetry.call("Query", &self.table_name, async {
            self.client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("user_id = :user_id")
                .expression_attribute_values(":user_id", string_attribute(user_id))
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.table_name))
        })
        .await?;

        let entries = parse_items(Some(items), |item| self.item_to_entry(item), "cart");
        info!("Cart has {} entries", entries.len());
        Ok(entries)
    }

    #[instrument(skip(self, entry), fields(table = %self.table_name, user_id = %entry.user_id, entry_id = %entry.id))]
    async fn add_entry(&self, entry: CartEntry) -> RepositoryResult<CartEntry> {
        let item = self.entry_to_item(&entry);
        self.telemetry.call("PutItem", &self.table_name, async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(id)")
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.table_name))
        })
        .await?;

        info!("Cart entry saved");
        Ok(entry)
    }

    #[instrument(skip(self), fields(table = %self.table_name, user_id = %user_id))]
    async fn delete_entries(&self, user_id: &str) -> RepositoryResult<usize> {
        let entries = self.find_entries(user_id).await?;

        for entry in &entries {
            self.telemetry.call("DeleteItem", &self.table_name, async {
                self.client
                    .delete_item()
                    .table_name(&self.table_name)
                    .set_key(Some(cart_entry_key(entry)))
                    .send()
                    .await
                    .map_err(|e| map_dynamodb_error(e.into(), &self.table_name))
            })
            .await?;
        }

        info!("Deleted {} cart entries", entries.len());
        Ok(entries.len())
    }
}
