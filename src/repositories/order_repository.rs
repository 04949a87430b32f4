use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, ReturnValue, TransactWriteItem};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::cart_repository::cart_entry_key;
use super::dynamodb::{
    decimal_attribute, get_bool, get_decimal, get_number, get_optional_string, get_string,
    map_dynamodb_error, parse_items, string_attribute, DynamoDbTelemetry, Item,
};
use crate::models::{
    CartEntry, Order, OrderChanges, OrderItem, RepositoryError, RepositoryResult,
};

/// Data access for orders and their line items
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Atomically store an order with its items and delete the cart entries they came from.
    ///
    /// Fails with `TransactionFailed` without writing anything if any consumed
    /// entry no longer exists.
    async fn place_order(
        &self,
        order: Order,
        items: Vec<OrderItem>,
        consumed: &[CartEntry],
    ) -> RepositoryResult<Order>;

    async fn find_order(&self, id: &str) -> RepositoryResult<Option<Order>>;

    async fn find_orders_for_delivery_crew(&self, crew_id: &str) -> RepositoryResult<Vec<Order>>;

    async fn find_items_for_order(&self, order_id: &str) -> RepositoryResult<Vec<OrderItem>>;

    async fn find_items_for_user(&self, user_id: &str) -> RepositoryResult<Vec<OrderItem>>;

    async fn find_all_items(&self) -> RepositoryResult<Vec<OrderItem>>;

    /// Write only the fields named in `changes` and return the stored order.
    ///
    /// With `assignee` set the write only lands while the order is still
    /// assigned to that user. A missing order or a failed assignment check
    /// yields `NotFound`.
    async fn update_order(
        &self,
        id: &str,
        changes: OrderChanges,
        assignee: Option<&str>,
    ) -> RepositoryResult<Order>;

    /// Delete an order and its items, returning the number of items removed
    async fn delete_order(&self, id: &str) -> RepositoryResult<usize>;
}

/// DynamoDB implementation of the OrderRepository trait.
///
/// Orders are keyed by `id`; order items by `order_id` (hash) + `id` (range).
/// The carts table is needed so order placement can consume cart entries in
/// the same transaction.
pub struct DynamoDbOrderRepository {
    client: Arc<DynamoDbClient>,
    orders_table: String,
    order_items_table: String,
    carts_table: String,
    telemetry: DynamoDbTelemetry,
}

/// UpdateItem expression touching only the fields present in `changes`.
/// STATUS is a DynamoDB reserved word, hence the `#status` placeholder.
pub fn order_update_expression(changes: &OrderChanges) -> String {
    let mut sets = Vec::new();
    let mut removes = Vec::new();
    if changes.status.is_some() {
        sets.push("#status = :status");
    }
    match &changes.delivery_crew {
        Some(Some(_)) => sets.push("delivery_crew = :crew"),
        Some(None) => removes.push("delivery_crew"),
        None => {}
    }

    let mut clauses = Vec::new();
    if !sets.is_empty() {
        clauses.push(format!("SET {}", sets.join(", ")));
    }
    if !removes.is_empty() {
        clauses.push(format!("REMOVE {}", removes.join(", ")));
    }
    clauses.join(" ")
}

fn build_error(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::AwsSdk {
        message: format!("Failed to build transaction item: {}", e),
    }
}

impl DynamoDbOrderRepository {
    pub fn new(
        client: Arc<DynamoDbClient>,
        orders_table: String,
        order_items_table: String,
        carts_table: String,
        telemetry: DynamoDbTelemetry,
    ) -> Self {
        Self {
            client,
            orders_table,
            order_items_table,
            carts_table,
            telemetry,
        }
    }

    pub fn order_to_item(&self, order: &Order) -> Item {
        let mut item = HashMap::new();
        item.insert("id".to_string(), string_attribute(&order.id));
        item.insert("user_id".to_string(), string_attribute(&order.user_id));
        if let Some(crew) = &order.delivery_crew {
            item.insert("delivery_crew".to_string(), string_attribute(crew));
        }
        item.insert("status".to_string(), AttributeValue::Bool(order.status));
        item.insert("total".to_string(), decimal_attribute(order.total));
        item.insert(
            "date".to_string(),
            string_attribute(order.date.format("%Y-%m-%d").to_string()),
        );
        item
    }

    pub fn item_to_order(&self, item: Item) -> RepositoryResult<Order> {
        let date = item
            .get("date")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .ok_or_else(|| RepositoryError::InvalidData {
                message: "Invalid date".to_string(),
            })?;

        Ok(Order {
            id: get_string(&item, "id")?,
            user_id: get_string(&item, "user_id")?,
            delivery_crew: get_optional_string(&item, "delivery_crew"),
            status: get_bool(&item, "status")?,
            total: get_decimal(&item, "total")?,
            date,
        })
    }

    pub fn order_item_to_item(&self, order_item: &OrderItem) -> Item {
        let mut item = HashMap::new();
        item.insert("order_id".to_string(), string_attribute(&order_item.order_id));
        item.insert("id".to_string(), string_attribute(&order_item.id));
        item.insert("user_id".to_string(), string_attribute(&order_item.user_id));
        item.insert(
            "menuitem_id".to_string(),
            string_attribute(&order_item.menuitem_id),
        );
        item.insert(
            "quantity".to_string(),
            AttributeValue::N(order_item.quantity.to_string()),
        );
        item.insert(
            "unit_price".to_string(),
            decimal_attribute(order_item.unit_price),
        );
        item.insert("price".to_string(), decimal_attribute(order_item.price));
        item
    }

    pub fn item_to_order_item(&self, item: Item) -> RepositoryResult<OrderItem> {
        Ok(OrderItem {
            id: get_string(&item, "id")?,
            order_id: get_string(&item, "order_id")?,
            user_id: get_string(&item, "user_id")?,
            menuitem_id: get_string(&item, "menuitem_id")?,
            quantity: get_number(&item, "quantity")?,
            unit_price: get_decimal(&item, "unit_price")?,
            price: get_decimal(&item, "price")?,
        })
    }

    /// Build the write set for placing an order
    pub fn placement_actions(
        &self,
        order: &Order,
        items: &[OrderItem],
        consumed: &[CartEntry],
    ) -> RepositoryResult<Vec<TransactWriteItem>> {
        let mut actions = Vec::with_capacity(1 + items.len() + consumed.len());

        let order_put = Put::builder()
            .table_name(&self.orders_table)
            .set_item(Some(self.order_to_item(order)))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(build_error)?;
        actions.push(TransactWriteItem::builder().put(order_put).build());

        for order_item in items {
            let item_put = Put::builder()
                .table_name(&self.order_items_table)
                .set_item(Some(self.order_item_to_item(order_item)))
                .build()
                .map_err(build_error)?;
            actions.push(TransactWriteItem::builder().put(item_put).build());
        }

        for entry in consumed {
            let entry_delete = Delete::builder()
                .table_name(&self.carts_table)
                .set_key(Some(cart_entry_key(entry)))
                .condition_expression("attribute_exists(id)")
                .build()
                .map_err(build_error)?;
            actions.push(TransactWriteItem::builder().delete(entry_delete).build());
        }

        Ok(actions)
    }

    async fn scan_items(
        &self,
        filter: Option<(&str, &str)>,
    ) -> RepositoryResult<Vec<OrderItem>> {
        let mut scan_builder = self.client.scan().table_name(&self.order_items_table);
        if let Some((field, value)) = filter {
            scan_builder = scan_builder
                .filter_expression(format!("{} = :value", field))
                .expression_attribute_values(":value", string_attribute(value));
        }

        let items = self.telemetry.call("Scan", &self.order_items_table, async {
            scan_builder
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.order_items_table))
        })
        .await?;

        Ok(parse_items(
            Some(items),
            |item| self.item_to_order_item(item),
            "order item",
        ))
    }
}

#[async_trait]
impl OrderRepository for DynamoDbOrderRepository {
    #[instrument(skip(self, order, items, consumed), fields(table = %self.orders_table, order_id = %order.id, item_count = items.len()))]
    async fn place_order(
        &self,
        order: Order,
        items: Vec<OrderItem>,
        consumed: &[CartEntry],
    ) -> RepositoryResult<Order> {
        let actions = self.placement_actions(&order, &items, consumed)?;
        self.telemetry.call("TransactWriteItems", &self.orders_table, async {
            self.client
                .transact_write_items()
                .set_transact_items(Some(actions))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.orders_table))
        })
        .await
        .map_err(|e| {
            warn!("Order placement transaction rejected: {}", e);
            e
        })?;

        info!("Order placed with {} items", items.len());
        Ok(order)
    }

    #[instrument(skip(self), fields(table = %self.orders_table, order_id = %id))]
    async fn find_order(&self, id: &str) -> RepositoryResult<Option<Order>> {
        let response = self.telemetry.call("GetItem", &self.orders_table, async {
            self.client
                .get_item()
                .table_name(&self.orders_table)
                .key("id", string_attribute(id))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.orders_table))
        })
        .await?;

        response.item.map(|item| self.item_to_order(item)).transpose()
    }

    #[instrument(skip(self), fields(table = %self.orders_table, crew_id = %crew_id))]
    async fn find_orders_for_delivery_crew(&self, crew_id: &str) -> RepositoryResult<Vec<Order>> {
        let items = self.telemetry.call("Scan", &self.orders_table, async {
            self.client
                .scan()
                .table_name(&self.orders_table)
                .filter_expression("delivery_crew = :crew")
                .expression_attribute_values(":crew", string_attribute(crew_id))
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.orders_table))
        })
        .await?;

        let orders = parse_items(Some(items), |item| self.item_to_order(item), "order");
        info!("Found {} assigned orders", orders.len());
        Ok(orders)
    }

    #[instrument(skip(self), fields(table = %self.order_items_table, order_id = %order_id))]
    async fn find_items_for_order(&self, order_id: &str) -> RepositoryResult<Vec<OrderItem>> {
        let items = self.telemetry.call("Query", &self.order_items_table, async {
            self.client
                .query()
                .table_name(&self.order_items_table)
                .key_condition_expression("order_id = :order_id")
                .expression_attribute_values(":order_id", string_attribute(order_id))
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.order_items_table))
        })
        .await?;

        Ok(parse_items(
            Some(items),
            |item| self.item_to_order_item(item),
            "order item",
        ))
    }

    #[instrument(skip(self), fields(table = %self.order_items_table, user_id = %user_id))]
    async fn find_items_for_user(&self, user_id: &str) -> RepositoryResult<Vec<OrderItem>> {
        self.scan_items(Some(("user_id", user_id))).await
    }

    #[instrument(skip(self), fields(table = %self.order_items_table))]
    async fn find_all_items(&self) -> RepositoryResult<Vec<OrderItem>> {
        self.scan_items(None).await
    }

    #[instrument(skip(self, changes), fields(table = %self.orders_table, order_id = %id, assignee = ?assignee))]
    async fn update_order(
        &self,
        id: &str,
        changes: OrderChanges,
        assignee: Option<&str>,
    ) -> RepositoryResult<Order> {
        if changes.is_empty() {
            return self
                .find_order(id)
                .await?
                .filter(|order| assignee.map_or(true, |user_id| order.is_assigned_to(user_id)))
                .ok_or(RepositoryError::NotFound);
        }

        let mut builder = self
            .client
            .update_item()
            .table_name(&self.orders_table)
            .key("id", string_attribute(id))
            .return_values(ReturnValue::AllNew);

        if let Some(status) = changes.status {
            builder = builder
                .expression_attribute_names("#status", "status")
                .expression_attribute_values(":status", AttributeValue::Bool(status));
        }
        if let Some(Some(crew_id)) = &changes.delivery_crew {
            builder = builder.expression_attribute_values(":crew", string_attribute(crew_id));
        }

        let mut condition = String::from("attribute_exists(id)");
        if let Some(user_id) = assignee {
            condition.push_str(" AND delivery_crew = :assignee");
            builder = builder.expression_attribute_values(":assignee", string_attribute(user_id));
        }

        let response = self.telemetry.call("UpdateItem", &self.orders_table, async {
            builder
                .update_expression(order_update_expression(&changes))
                .condition_expression(condition)
                .send()
                .await
                .map_err(|e| match map_dynamodb_error(e.into(), &self.orders_table) {
                    RepositoryError::ConstraintViolation { .. } => RepositoryError::NotFound,
                    other => other,
                })
        })
        .await?;

        let order = response
            .attributes
            .ok_or_else(|| RepositoryError::InvalidData {
                message: "UpdateItem returned no attributes".to_string(),
            })
            .and_then(|item| self.item_to_order(item))?;

        info!("Order updated");
        Ok(order)
    }

    #[instrument(skip(self), fields(table = %self.orders_table, order_id = %id))]
    async fn delete_order(&self, id: &str) -> RepositoryResult<usize> {
        let items = self.find_items_for_order(id).await?;

        let mut actions = Vec::with_capacity(items.len() + 1);
        let order_delete = Delete::builder()
            .table_name(&self.orders_table)
            .key("id", string_attribute(id))
            .condition_expression("attribute_exists(id)")
            .build()
            .map_err(build_error)?;
        actions.push(TransactWriteItem::builder().delete(order_delete).build());

        for order_item in &items {
            let item_delete = Delete::builder()
                .table_name(&self.order_items_table)
                .key("order_id", string_attribute(&order_item.order_id))
                .key("id", string_attribute(&order_item.id))
                .build()
                .map_err(build_error)?;
            actions.push(TransactWriteItem::builder().delete(item_delete).build());
        }

        self.telemetry.call("TransactWriteItems", &self.orders_table, async {
            self.client
                .transact_write_items()
                .set_transact_items(Some(actions))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.orders_table))
        })
        .await?;

        info!("Order deleted with {} items", items.len());
        Ok(items.len())
    }
}
