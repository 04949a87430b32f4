// Services module - business logic layer

pub mod access_policy;
pub mod cart_service;
pub mod group_service;
pub mod menu_service;
pub mod order_service;

pub use access_policy::Caller;
pub use cart_service::CartService;
pub use group_service::GroupService;
pub use menu_service::MenuService;
pub use order_service::OrderService;
