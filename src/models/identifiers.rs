use uuid::Uuid;

pub const CATEGORY_ID_PREFIX: char = 'C';
pub const MENU_ITEM_ID_PREFIX: char = 'M';
pub const USER_ID_PREFIX: char = 'U';
pub const GROUP_ID_PREFIX: char = 'G';
pub const CART_ENTRY_ID_PREFIX: char = 'E';
pub const ORDER_ID_PREFIX: char = 'O';
pub const ORDER_ITEM_ID_PREFIX: char = 'I';

/// Generate an opaque entity identifier: a one-letter prefix followed by 12 hex characters
pub fn generate_id(prefix: char) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, simple.get(0..12).unwrap_or("000000000000"))
}
