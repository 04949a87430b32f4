// Repositories module - data access layer

pub mod cart_repository;
pub mod dynamodb;
pub mod memory;
pub mod menu_repository;
pub mod order_repository;
pub mod table_manager;
pub mod user_repository;

#[cfg(test)]
mod tests;

pub use cart_repository::{CartRepository, DynamoDbCartRepository};
pub use memory::InMemoryStore;
pub use menu_repository::{DynamoDbMenuRepository, MenuRepository};
pub use order_repository::{order_update_expression, DynamoDbOrderRepository, OrderRepository};
pub use table_manager::{table_specs, TableManager, TableSpec};
pub use user_repository::{DynamoDbUserRepository, UserRepository};
