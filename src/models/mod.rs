// Re-export all model types
pub use self::cart::*;
pub use self::enums::*;
pub use self::errors::*;
pub use self::identifiers::*;
pub use self::menu::*;
pub use self::order::*;
pub use self::user::*;
pub use self::validation::*;

mod cart;
mod enums;
mod errors;
mod identifiers;
mod menu;
mod order;
mod user;
mod validation;
