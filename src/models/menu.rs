use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{generate_id, CATEGORY_ID_PREFIX, MENU_ITEM_ID_PREFIX};

/// Menu category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub slug: String,
    pub title: String,
}

/// Orderable dish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    pub featured: bool,
    pub category_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryRequest {
    pub slug: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMenuItemRequest {
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub featured: bool,
    pub category_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMenuItemRequest {
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub featured: Option<bool>,
    pub category_id: Option<String>,
}

/// Query parameters accepted by the menu item listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenuItemFilters {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// Menu item with its category embedded, as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItemResponse {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    pub featured: bool,
    pub category: Category,
}

impl Category {
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: generate_id(CATEGORY_ID_PREFIX),
            slug: slug.into(),
            title: title.into(),
        }
    }

    pub fn apply_update(&mut self, request: UpdateCategoryRequest) {
        if let Some(slug) = request.slug {
            self.slug = slug.trim().to_string();
        }
        if let Some(title) = request.title {
            self.title = title.trim().to_string();
        }
    }
}

impl From<CreateCategoryRequest> for Category {
    fn from(request: CreateCategoryRequest) -> Self {
        Category::new(request.slug.trim(), request.title.trim())
    }
}

impl From<CreateCategoryRequest> for UpdateCategoryRequest {
    fn from(request: CreateCategoryRequest) -> Self {
        Self {
            slug: Some(request.slug),
            title: Some(request.title),
        }
    }
}

impl MenuItem {
    pub fn new(
        title: impl Into<String>,
        price: Decimal,
        featured: bool,
        category_id: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(MENU_ITEM_ID_PREFIX),
            title: title.into(),
            price,
            featured,
            category_id: category_id.into(),
        }
    }

    pub fn apply_update(&mut self, request: UpdateMenuItemRequest) {
        if let Some(title) = request.title {
            self.title = title.trim().to_string();
        }
        if let Some(price) = request.price {
            self.price = price;
        }
        if let Some(featured) = request.featured {
            self.featured = featured;
        }
        if let Some(category_id) = request.category_id {
            self.category_id = category_id;
        }
    }

    pub fn to_response(&self, category: Category) -> MenuItemResponse {
        MenuItemResponse {
            id: self.id.clone(),
            title: self.title.clone(),
            price: self.price,
            featured: self.featured,
            category,
        }
    }

    /// Case-insensitive match against the item title or its category title
    pub fn matches_search(&self, category: Option<&Category>, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&term)
            || category
                .map(|c| c.title.to_lowercase().contains(&term))
                .unwrap_or(false)
    }
}

impl From<CreateMenuItemRequest> for MenuItem {
    fn from(request: CreateMenuItemRequest) -> Self {
        MenuItem::new(
            request.title.trim(),
            request.price,
            request.featured,
            request.category_id,
        )
    }
}

impl From<CreateMenuItemRequest> for UpdateMenuItemRequest {
    fn from(request: CreateMenuItemRequest) -> Self {
        Self {
            title: Some(request.title),
            price: Some(request.price),
            featured: Some(request.featured),
            category_id: Some(request.category_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_menu_item_update() {
        let mut item = MenuItem::new("Greek Salad", dec!(12.50), false, "C1");
        item.apply_update(UpdateMenuItemRequest {
            price: Some(dec!(13.00)),
            featured: Some(true),
            ..Default::default()
        });

        assert_eq!(item.title, "Greek Salad");
        assert_eq!(item.price, dec!(13.00));
        assert!(item.featured);
        assert_eq!(item.category_id, "C1");
    }

    #[test]
    fn test_matches_search() {
        let category = Category::new("mains", "Main Courses");
        let item = MenuItem::new("Lemon Chicken", dec!(18.00), true, category.id.clone());

        assert!(item.matches_search(Some(&category), "lemon"));
        assert!(item.matches_search(Some(&category), "MAIN"));
        assert!(item.matches_search(None, "  "));
        assert!(!item.matches_search(Some(&category), "dessert"));
        assert!(!item.matches_search(None, "main"));
    }

    #[test]
    fn test_put_request_becomes_full_update() {
        let update: UpdateCategoryRequest = CreateCategoryRequest {
            slug: "desserts".to_string(),
            title: "Desserts".to_string(),
        }
        .into();
        assert_eq!(update.slug.as_deref(), Some("desserts"));
        assert_eq!(update.title.as_deref(), Some("Desserts"));
    }

    #[test]
    fn test_price_accepts_string_and_number() {
        let from_string: CreateMenuItemRequest = serde_json::from_str(
            r#"{"title":"Bruschetta","price":"7.25","category_id":"C1"}"#,
        )
        .unwrap();
        assert_eq!(from_string.price, dec!(7.25));
        assert!(!from_string.featured);

        let from_number: CreateMenuItemRequest = serde_json::from_str(
            r#"{"title":"Bruschetta","price":7.25,"featured":true,"category_id":"C1"}"#,
        )
        .unwrap();
        assert_eq!(from_number.price, dec!(7.25));
        assert!(from_number.featured);
    }
}
