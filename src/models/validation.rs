use rust_decimal::Decimal;

use super::{
    CreateCategoryRequest, CreateMenuItemRequest, UpdateCategoryRequest, UpdateMenuItemRequest,
    ValidationError, ValidationResult,
};

/// Trait for validating input models
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

/// Validation constants
pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_SLUG_LENGTH: usize = 255;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01
pub const MAX_PRICE: Decimal = Decimal::from_parts(999999, 0, 0, false, 2); // 9999.99
pub const MAX_CART_QUANTITY: u32 = 1000;
pub const MIN_CART_QUANTITY: u32 = 1;
/// One order write is a single store transaction of at most 100 actions:
/// the order itself plus an item put and a cart delete per entry.
pub const MAX_ORDER_ENTRIES: usize = 49;
/// Order totals are stored with six digits, two of them decimal
pub const MAX_ORDER_TOTAL: Decimal = Decimal::from_parts(999999, 0, 0, false, 2); // 9999.99

impl Validate for CreateCategoryRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_slug(&self.slug)?;
        validate_title("title", &self.title)?;
        Ok(())
    }
}

impl Validate for UpdateCategoryRequest {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        if let Some(title) = &self.title {
            validate_title("title", title)?;
        }
        Ok(())
    }
}

impl Validate for CreateMenuItemRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_title("title", &self.title)?;
        validate_price(&self.price)?;
        validate_required("category_id", &self.category_id)?;
        Ok(())
    }
}

impl Validate for UpdateMenuItemRequest {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(title) = &self.title {
            validate_title("title", title)?;
        }
        if let Some(price) = &self.price {
            validate_price(price)?;
        }
        if let Some(category_id) = &self.category_id {
            validate_required("category_id", category_id)?;
        }
        Ok(())
    }
}

fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredField {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validate a category slug: lowercase letters, digits and hyphens
pub fn validate_slug(slug: &str) -> ValidationResult<()> {
    let trimmed = slug.trim();
    validate_required("slug", trimmed)?;

    if trimmed.len() > MAX_SLUG_LENGTH {
        return Err(ValidationError::TooLong {
            field: "slug".to_string(),
            max_length: MAX_SLUG_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "slug".to_string(),
            expected: "lowercase letters, digits and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validate a display title
pub fn validate_title(field: &str, title: &str) -> ValidationResult<()> {
    let trimmed = title.trim();
    validate_required(field, trimmed)?;

    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length: MAX_TITLE_LENGTH,
            actual_length: trimmed.chars().count(),
        });
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: title.to_string(),
            reason: "Contains invalid control characters".to_string(),
        });
    }

    Ok(())
}

/// Validate a menu item price
pub fn validate_price(price: &Decimal) -> ValidationResult<()> {
    if *price < MIN_PRICE || *price > MAX_PRICE {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: MIN_PRICE.to_string(),
            max: MAX_PRICE.to_string(),
            value: price.to_string(),
        });
    }

    if price.normalize().scale() > 2 {
        return Err(ValidationError::InvalidValue {
            field: "price".to_string(),
            value: price.to_string(),
            reason: "Price cannot have more than 2 decimal places".to_string(),
        });
    }

    Ok(())
}

/// Validate the total of an order about to be placed
pub fn validate_order_total(total: &Decimal) -> ValidationResult<()> {
    if *total > MAX_ORDER_TOTAL {
        return Err(ValidationError::OutOfRange {
            field: "total".to_string(),
            min: Decimal::ZERO.to_string(),
            max: MAX_ORDER_TOTAL.to_string(),
            value: total.to_string(),
        });
    }
    Ok(())
}

/// Validate a requested cart quantity and narrow it to the stored type
pub fn validate_cart_quantity(quantity: Option<i64>) -> ValidationResult<u32> {
    let quantity = quantity.ok_or_else(|| ValidationError::RequiredField {
        field: "quantity".to_string(),
    })?;

    if quantity < i64::from(MIN_CART_QUANTITY) || quantity > i64::from(MAX_CART_QUANTITY) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: MIN_CART_QUANTITY.to_string(),
            max: MAX_CART_QUANTITY.to_string(),
            value: quantity.to_string(),
        });
    }

    u32::try_from(quantity).map_err(|_| ValidationError::InvalidValue {
        field: "quantity".to_string(),
        value: quantity.to_string(),
        reason: "Quantity does not fit".to_string(),
    })
}

/// Validate a username supplied in a request body
pub fn validate_username(username: Option<&str>) -> ValidationResult<String> {
    let trimmed = username.map(str::trim).unwrap_or_default();
    validate_required("username", trimmed)?;

    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max_length: MAX_USERNAME_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            expected: "letters, digits and @/./+/-/_".to_string(),
        });
    }

    Ok(trimmed.to_string())
}
