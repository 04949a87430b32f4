use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use super::Caller;
use crate::models::{
    Category, CreateCategoryRequest, CreateMenuItemRequest, MenuItem, MenuItemFilters,
    MenuItemResponse, MenuOrdering, MenuOrderingField, ServiceError, ServiceResult,
    UpdateCategoryRequest, UpdateMenuItemRequest, Validate,
};
use crate::repositories::MenuRepository;

/// Service for the catalog: categories and menu items
pub struct MenuService {
    menu_repository: Arc<dyn MenuRepository>,
}

impl MenuService {
    pub fn new(menu_repository: Arc<dyn MenuRepository>) -> Self {
        Self { menu_repository }
    }

    // ============================================================================
    // CATEGORIES
    // ============================================================================

    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        let mut categories = self.menu_repository.list_categories().await?;
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn get_category(&self, id: &str) -> ServiceResult<Category> {
        self.menu_repository
            .find_category(id)
            .await?
            .ok_or_else(|| ServiceError::CategoryNotFound { id: id.to_string() })
    }

    #[instrument(skip(self, caller, request), fields(user = %caller.username(), slug = %request.slug))]
    pub async fn create_category(
        &self,
        caller: &Caller,
        request: CreateCategoryRequest,
    ) -> ServiceResult<Category> {
        caller.require_catalog_admin()?;
        request.validate()?;

        let category = Category::from(request);
        self.ensure_slug_available(&category.slug, None).await?;

        let category = self.menu_repository.create_category(category).await?;
        crate::info_with_trace!(category_id = %category.id, "Category created");
        Ok(category)
    }

    #[instrument(skip(self, caller, request), fields(user = %caller.username(), category_id = %id))]
    pub async fn update_category(
        &self,
        caller: &Caller,
        id: &str,
        request: UpdateCategoryRequest,
    ) -> ServiceResult<Category> {
        caller.require_catalog_admin()?;
        request.validate()?;

        let mut category = self.get_category(id).await?;
        category.apply_update(request);
        self.ensure_slug_available(&category.slug, Some(id)).await?;

        let category = self.menu_repository.update_category(category).await?;
        info!("Category updated");
        Ok(category)
    }

    #[instrument(skip(self, caller), fields(user = %caller.username(), category_id = %id))]
    pub async fn delete_category(&self, caller: &Caller, id: &str) -> ServiceResult<()> {
        caller.require_catalog_admin()?;
        self.get_category(id).await?;

        let referencing = self.menu_repository.count_menu_items_in_category(id).await?;
        if referencing > 0 {
            return Err(ServiceError::validation(format!(
                "category is still used by {} menu items",
                referencing
            )));
        }

        self.menu_repository.delete_category(id).await?;
        crate::info_with_trace!("Category deleted");
        Ok(())
    }

    async fn ensure_slug_available(&self, slug: &str, own_id: Option<&str>) -> ServiceResult<()> {
        match self.menu_repository.find_category_by_slug(slug).await? {
            Some(existing) if Some(existing.id.as_str()) != own_id => Err(
                ServiceError::validation(format!("category with slug '{}' already exists", slug)),
            ),
            _ => Ok(()),
        }
    }

    // ============================================================================
    // MENU ITEMS
    // ============================================================================

    /// List menu items with filtering, search and ordering.
    ///
    /// Without an explicit ordering, items are sorted by title.
    #[instrument(skip(self, filters), fields(category = ?filters.category, featured = ?filters.featured))]
    pub async fn list_menu_items(
        &self,
        filters: MenuItemFilters,
    ) -> ServiceResult<Vec<MenuItemResponse>> {
        let ordering = match filters.ordering.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw
                .parse::<MenuOrdering>()
                .map_err(ServiceError::validation)?,
            _ => MenuOrdering {
                field: MenuOrderingField::Title,
                descending: false,
            },
        };

        let categories: HashMap<String, Category> = self
            .menu_repository
            .list_categories()
            .await?
            .into_iter()
            .map(|category| (category.id.clone(), category))
            .collect();

        let mut items = self
            .menu_repository
            .list_menu_items(filters.category.as_deref(), filters.featured)
            .await?;

        if let Some(term) = filters.search.as_deref() {
            items.retain(|item| item.matches_search(categories.get(&item.category_id), term));
        }

        sort_menu_items(&mut items, ordering);

        let responses: Vec<MenuItemResponse> = items
            .into_iter()
            .filter_map(|item| {
                let category = categories.get(&item.category_id).cloned();
                if category.is_none() {
                    crate::warn_with_trace!(menu_item_id = %item.id, "Menu item references a missing category");
                }
                category.map(|category| item.to_response(category))
            })
            .collect();

        info!("Found {} menu items", responses.len());
        Ok(responses)
    }

    #[instrument(skip(self), fields(menu_item_id = %id))]
    pub async fn get_menu_item(&self, id: &str) -> ServiceResult<MenuItemResponse> {
        let item = self.find_menu_item(id).await?;
        let category = self.get_category(&item.category_id).await?;
        Ok(item.to_response(category))
    }

    /// Resolve a menu item reference to the stored item
    pub async fn find_menu_item(&self, id: &str) -> ServiceResult<MenuItem> {
        self.menu_repository
            .find_menu_item(id)
            .await?
            .ok_or_else(|| ServiceError::MenuItemNotFound { id: id.to_string() })
    }

    #[instrument(skip(self, caller, request), fields(user = %caller.username(), title = %request.title))]
    pub async fn create_menu_item(
        &self,
        caller: &Caller,
        request: CreateMenuItemRequest,
    ) -> ServiceResult<MenuItemResponse> {
        caller.require_catalog_admin()?;
        request.validate()?;

        let category = self.existing_category(&request.category_id).await?;
        let item = self
            .menu_repository
            .create_menu_item(MenuItem::from(request))
            .await?;

        crate::info_with_trace!(menu_item_id = %item.id, "Menu item created");
        Ok(item.to_response(category))
    }

    #[instrument(skip(self, caller, request), fields(user = %caller.username(), menu_item_id = %id))]
    pub async fn update_menu_item(
        &self,
        caller: &Caller,
        id: &str,
        request: UpdateMenuItemRequest,
    ) -> ServiceResult<MenuItemResponse> {
        caller.require_catalog_admin()?;
        request.validate()?;

        let mut item = self.find_menu_item(id).await?;
        item.apply_update(request);
        let category = self.existing_category(&item.category_id).await?;

        let item = self.menu_repository.update_menu_item(item).await?;
        info!("Menu item updated");
        Ok(item.to_response(category))
    }

    #[instrument(skip(self, caller), fields(user = %caller.username(), menu_item_id = %id))]
    pub async fn delete_menu_item(&self, caller: &Caller, id: &str) -> ServiceResult<()> {
        caller.require_catalog_admin()?;
        self.find_menu_item(id).await?;
        self.menu_repository.delete_menu_item(id).await?;
        crate::info_with_trace!("Menu item deleted");
        Ok(())
    }

    /// A menu item may only point at an existing category
    async fn existing_category(&self, id: &str) -> ServiceResult<Category> {
        self.menu_repository
            .find_category(id)
            .await?
            .ok_or_else(|| ServiceError::validation(format!("category '{}' does not exist", id)))
    }
}

fn sort_menu_items(items: &mut [MenuItem], ordering: MenuOrdering) {
    match ordering.field {
        MenuOrderingField::Price => items.sort_by(|a, b| a.price.cmp(&b.price)),
        MenuOrderingField::Title => items.sort_by(|a, b| a.title.cmp(&b.title)),
    }
    if ordering.descending {
        items.reverse();
    }
}
