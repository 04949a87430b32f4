use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Select};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use super::dynamodb::{
    decimal_attribute, get_bool, get_decimal, get_string, map_dynamodb_error, parse_items,
    string_attribute, DynamoDbTelemetry, Item,
};
use crate::models::{Category, MenuItem, RepositoryError, RepositoryResult};

/// Data access for the catalog: categories and menu items
#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn list_categories(&self) -> RepositoryResult<Vec<Category>>;

    async fn find_category(&self, id: &str) -> RepositoryResult<Option<Category>>;

    async fn find_category_by_slug(&self, slug: &str) -> RepositoryResult<Option<Category>>;

    async fn create_category(&self, category: Category) -> RepositoryResult<Category>;

    async fn update_category(&self, category: Category) -> RepositoryResult<Category>;

    async fn delete_category(&self, id: &str) -> RepositoryResult<()>;

    /// List menu items, optionally narrowed to a category and/or featured flag
    async fn list_menu_items(
        &self,
        category_id: Option<&str>,
        featured: Option<bool>,
    ) -> RepositoryResult<Vec<MenuItem>>;

    async fn find_menu_item(&self, id: &str) -> RepositoryResult<Option<MenuItem>>;

    async fn create_menu_item(&self, item: MenuItem) -> RepositoryResult<MenuItem>;

    async fn update_menu_item(&self, item: MenuItem) -> RepositoryResult<MenuItem>;

    async fn delete_menu_item(&self, id: &str) -> RepositoryResult<()>;

    /// Number of menu items referencing a category
    async fn count_menu_items_in_category(&self, category_id: &str) -> RepositoryResult<usize>;
}

/// DynamoDB implementation of the MenuRepository trait
pub struct DynamoDbMenuRepository {
    client: Arc<DynamoDbClient>,
    categories_table: String,
    menu_items_table: String,
    telemetry: DynamoDbTelemetry,
}

impl DynamoDbMenuRepository {
    pub fn new(
        client: Arc<DynamoDbClient>,
        categories_table: String,
        menu_items_table: String,
        telemetry: DynamoDbTelemetry,
    ) -> Self {
        Self {
            client,
            categories_table,
            menu_items_table,
            telemetry,
        }
    }

    pub fn category_to_item(&self, category: &Category) -> Item {
        let mut item = HashMap::new();
        item.insert("id".to_string(), string_attribute(&category.id));
        item.insert("slug".to_string(), string_attribute(&category.slug));
        item.insert("title".to_string(), string_attribute(&category.title));
        item
    }

    pub fn item_to_category(&self, item: Item) -> RepositoryResult<Category> {
        Ok(Category {
            id: get_string(&item, "id")?,
            slug: get_string(&item, "slug")?,
            title: get_string(&item, "title")?,
        })
    }

    pub fn menu_item_to_item(&self, menu_item: &MenuItem) -> Item {
        let mut item = HashMap::new();
        item.insert("id".to_string(), string_attribute(&menu_item.id));
        item.insert("title".to_string(), string_attribute(&menu_item.title));
        item.insert("price".to_string(), decimal_attribute(menu_item.price));
        item.insert(
            "featured".to_string(),
            AttributeValue::Bool(menu_item.featured),
        );
        item.insert(
            "category_id".to_string(),
            string_attribute(&menu_item.category_id),
        );
        item
    }

    pub fn item_to_menu_item(&self, item: Item) -> RepositoryResult<MenuItem> {
        Ok(MenuItem {
            id: get_string(&item, "id")?,
            title: get_string(&item, "title")?,
            price: get_decimal(&item, "price")?,
            featured: get_bool(&item, "featured")?,
            category_id: get_string(&item, "category_id")?,
        })
    }

    async fn put(
        &self,
        table_name: &str,
        item: Item,
        condition: &str,
        id: &str,
    ) -> RepositoryResult<()> {
        self.telemetry.call("PutItem", table_name, async {
            self.client
                .put_item()
                .table_name(table_name)
                .set_item(Some(item))
                .condition_expression(condition)
                .send()
                .await
                .map_err(|e| match map_dynamodb_error(e.into(), table_name) {
                    RepositoryError::ConstraintViolation { .. }
                        if condition.starts_with("attribute_exists") =>
                    {
                        RepositoryError::NotFound
                    }
                    RepositoryError::ConstraintViolation { .. } => {
                        RepositoryError::ConstraintViolation {
                            message: format!("{} already exists", id),
                        }
                    }
                    other => other,
                })
        })
        .await?;

        Ok(())
    }

    async fn get(&self, table_name: &str, id: &str) -> RepositoryResult<Option<Item>> {
        let response = self.telemetry.call("GetItem", table_name, async {
            self.client
                .get_item()
                .table_name(table_name)
                .key("id", string_attribute(id))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), table_name))
        })
        .await?;

        Ok(response.item)
    }

    async fn delete(&self, table_name: &str, id: &str) -> RepositoryResult<()> {
        self.telemetry.call("DeleteItem", table_name, async {
            self.client
                .delete_item()
                .table_name(table_name)
                .key("id", string_attribute(id))
                .condition_expression("attribute_exists(id)")
                .send()
                .await
                .map_err(|e| match map_dynamodb_error(e.into(), table_name) {
                    RepositoryError::ConstraintViolation { .. } => RepositoryError::NotFound,
                    other => other,
                })
        })
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MenuRepository for DynamoDbMenuRepository {
    #[instrument(skip(self), fields(table = %self.categories_table))]
    async fn list_categories(&self) -> RepositoryResult<Vec<Category>> {
        let items = self.telemetry.call("Scan", &self.categories_table, async {
            self.client
                .scan()
                .table_name(&self.categories_table)
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.categories_table))
        })
        .await?;

        let categories = parse_items(Some(items), |item| self.item_to_category(item), "category");
        info!("Found {} categories", categories.len());
        Ok(categories)
    }

    #[instrument(skip(self), fields(table = %self.categories_table, id = %id))]
    async fn find_category(&self, id: &str) -> RepositoryResult<Option<Category>> {
        self.get(&self.categories_table, id)
            .await?
            .map(|item| self.item_to_category(item))
            .transpose()
    }

    #[instrument(skip(self), fields(table = %self.categories_table, slug = %slug))]
    async fn find_category_by_slug(&self, slug: &str) -> RepositoryResult<Option<Category>> {
        let items = self.telemetry.call("Scan", &self.categories_table, async {
            self.client
                .scan()
                .table_name(&self.categories_table)
                .filter_expression("slug = :slug")
                .expression_attribute_values(":slug", string_attribute(slug))
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.categories_table))
        })
        .await?;

        Ok(parse_items(Some(items), |item| self.item_to_category(item), "category")
            .into_iter()
            .next())
    }

    #[instrument(skip(self, category), fields(table = %self.categories_table, id = %category.id))]
    async fn create_category(&self, category: Category) -> RepositoryResult<Category> {
        let item = self.category_to_item(&category);
        self.put(
            &self.categories_table,
            item,
            "attribute_not_exists(id)",
            &category.id,
        )
        .await?;
        info!("Category created");
        Ok(category)
    }

    #[instrument(skip(self, category), fields(table = %self.categories_table, id = %category.id))]
    async fn update_category(&self, category: Category) -> RepositoryResult<Category> {
        let item = self.category_to_item(&category);
        self.put(
            &self.categories_table,
            item,
            "attribute_exists(id)",
            &category.id,
        )
        .await?;
        info!("Category updated");
        Ok(category)
    }

    #[instrument(skip(self), fields(table = %self.categories_table, id = %id))]
    async fn delete_category(&self, id: &str) -> RepositoryResult<()> {
        self.delete(&self.categories_table, id).await?;
        info!("Category deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.menu_items_table))]
    async fn list_menu_items(
        &self,
        category_id: Option<&str>,
        featured: Option<bool>,
    ) -> RepositoryResult<Vec<MenuItem>> {
        let mut filter_expressions = Vec::new();
        let mut expression_attribute_values = HashMap::new();

        if let Some(category_id) = category_id {
            filter_expressions.push("category_id = :category_id");
            expression_attribute_values
                .insert(":category_id".to_string(), string_attribute(category_id));
        }
        if let Some(featured) = featured {
            filter_expressions.push("featured = :featured");
            expression_attribute_values
                .insert(":featured".to_string(), AttributeValue::Bool(featured));
        }

        let mut scan_builder = self.client.scan().table_name(&self.menu_items_table);
        if !filter_expressions.is_empty() {
            scan_builder = scan_builder
                .filter_expression(filter_expressions.join(" AND "))
                .set_expression_attribute_values(Some(expression_attribute_values));
        }

        let items = self.telemetry.call("Scan", &self.menu_items_table, async {
            scan_builder
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.menu_items_table))
        })
        .await?;

        let menu_items = parse_items(Some(items), |item| self.item_to_menu_item(item), "menu");
        info!("Found {} menu items", menu_items.len());
        Ok(menu_items)
    }

    #[instrument(skip(self), fields(table = %self.menu_items_table, id = %id))]
    async fn find_menu_item(&self, id: &str) -> RepositoryResult<Option<MenuItem>> {
        self.get(&self.menu_items_table, id)
            .await?
            .map(|item| self.item_to_menu_item(item))
            .transpose()
    }

    #[instrument(skip(self, menu_item), fields(table = %self.menu_items_table, id = %menu_item.id))]
    async fn create_menu_item(&self, menu_item: MenuItem) -> RepositoryResult<MenuItem> {
        let item = self.menu_item_to_item(&menu_item);
        self.put(
            &self.menu_items_table,
            item,
            "attribute_not_exists(id)",
            &menu_item.id,
        )
        .await?;
        info!("Menu item created");
        Ok(menu_item)
    }

    #[instrument(skip(self, menu_item), fields(table = %self.menu_items_table, id = %menu_item.id))]
    async fn update_menu_item(&self, menu_item: MenuItem) -> RepositoryResult<MenuItem> {
        let item = self.menu_item_to_item(&menu_item);
        self.put(
            &self.menu_items_table,
            item,
            "attribute_exists(id)",
            &menu_item.id,
        )
        .await?;
        info!("Menu item updated");
        Ok(menu_item)
    }

    #[instrument(skip(self), fields(table = %self.menu_items_table, id = %id))]
    async fn delete_menu_item(&self, id: &str) -> RepositoryResult<()> {
        self.delete(&self.menu_items_table, id).await?;
        info!("Menu item deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.menu_items_table, category_id = %category_id))]
    async fn count_menu_items_in_category(&self, category_id: &str) -> RepositoryResult<usize> {
        let pages = self.telemetry.call("Scan", &self.menu_items_table, async {
            self.client
                .scan()
                .table_name(&self.menu_items_table)
                .filter_expression("category_id = :category_id")
                .expression_attribute_values(":category_id", string_attribute(category_id))
                .select(Select::Count)
                .into_paginator()
                .send()
                .try_collect()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), &self.menu_items_table))
        })
        .await?;

        let count: usize = pages.iter().map(|page| page.count() as usize).sum();
        info!("Category has {} menu items", count);
        Ok(count)
    }
}
